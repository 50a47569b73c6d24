use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandResult};
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;

use super::{check_msg, database, get_guild, has_manage_guild};
use crate::db::GuildSettings;

#[group]
#[commands(settings, setvolume, settimeout, djrole, logchannel)]
pub struct Settings;

#[command]
#[only_in(guilds)]
async fn settings(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = super::get_guild_id(ctx, msg)?;
    let row = database(ctx)
        .await
        .guild_settings(guild_id)
        .await?
        .unwrap_or_else(|| GuildSettings::defaults(guild_id));

    let dj_role = row
        .dj_role_id()
        .map(|role| format!("<@&{}>", role.0))
        .unwrap_or_else(|| "not set".to_string());
    let log_channel = row
        .log_channel_id()
        .map(|channel| format!("<#{}>", channel.0))
        .unwrap_or_else(|| "not set".to_string());

    check_msg(
        msg.channel_id
            .send_message(&ctx.http, |m| {
                m.embed(|e| {
                    e.title("Guild settings");
                    e.field("Default volume", format!("{}%", row.default_volume), true);
                    e.field("Idle timeout", format!("{}s", row.idle_timeout_secs), true);
                    e.field("DJ role", dj_role, true);
                    e.field("Log channel", log_channel, true);
                    e
                })
            })
            .await,
    );

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn setvolume(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    if !has_manage_guild(ctx, &guild, msg).await {
        check_msg(
            msg.reply(ctx, "You need the Manage Server permission for that.")
                .await,
        );
        return Ok(());
    }

    let level = match args.single::<i64>() {
        Ok(level) if (1..=100).contains(&level) => level as u8,
        _ => {
            check_msg(msg.reply(ctx, "Give me a volume between 1 and 100.").await);
            return Ok(());
        }
    };

    database(ctx).await.set_default_volume(guild.id, level).await?;
    check_msg(
        msg.channel_id
            .say(&ctx.http, format!("New sessions will start at {level}% volume."))
            .await,
    );

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn settimeout(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    if !has_manage_guild(ctx, &guild, msg).await {
        check_msg(
            msg.reply(ctx, "You need the Manage Server permission for that.")
                .await,
        );
        return Ok(());
    }

    let seconds = match args.single::<u32>() {
        Ok(seconds) if (30..=7200).contains(&seconds) => seconds,
        _ => {
            check_msg(
                msg.reply(ctx, "Give me an idle timeout between 30 and 7200 seconds.")
                    .await,
            );
            return Ok(());
        }
    };

    database(ctx).await.set_idle_timeout(guild.id, seconds).await?;
    check_msg(
        msg.channel_id
            .say(&ctx.http, format!("I will disconnect after {seconds}s of silence."))
            .await,
    );

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn djrole(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    if !has_manage_guild(ctx, &guild, msg).await {
        check_msg(
            msg.reply(ctx, "You need the Manage Server permission for that.")
                .await,
        );
        return Ok(());
    }

    let choice = if args.rest().trim() == "none" {
        None
    } else {
        match msg.mention_roles.first().copied() {
            Some(role) => Some(role),
            None => {
                check_msg(
                    msg.reply(ctx, "Mention the role to use, or say `none` to clear it.")
                        .await,
                );
                return Ok(());
            }
        }
    };

    database(ctx).await.set_dj_role(guild.id, choice).await?;
    let note = match choice {
        Some(role) => format!("<@&{}> now counts as DJ.", role.0),
        None => "Cleared the DJ role.".to_string(),
    };
    check_msg(msg.channel_id.say(&ctx.http, note).await);

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn logchannel(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    if !has_manage_guild(ctx, &guild, msg).await {
        check_msg(
            msg.reply(ctx, "You need the Manage Server permission for that.")
                .await,
        );
        return Ok(());
    }

    let raw = args.rest().trim();
    let choice = if raw == "none" {
        None
    } else {
        match parse_channel_ref(raw) {
            Some(channel) => Some(channel),
            None => {
                check_msg(
                    msg.reply(ctx, "Mention the channel to use, or say `none` to clear it.")
                        .await,
                );
                return Ok(());
            }
        }
    };

    database(ctx).await.set_log_channel(guild.id, choice).await?;
    let note = match choice {
        Some(channel) => format!("Command failures will be mirrored to <#{}>.", channel.0),
        None => "Cleared the log channel.".to_string(),
    };
    check_msg(msg.channel_id.say(&ctx.http, note).await);

    Ok(())
}

/// Accepts `<#123>` mentions and bare ids.
fn parse_channel_ref(raw: &str) -> Option<ChannelId> {
    let digits = raw
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(raw);

    digits.parse::<u64>().ok().map(ChannelId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_refs_parse_from_mentions_and_ids() {
        assert_eq!(parse_channel_ref("<#42>"), Some(ChannelId(42)));
        assert_eq!(parse_channel_ref("42"), Some(ChannelId(42)));
        assert_eq!(parse_channel_ref("#general"), None);
        assert_eq!(parse_channel_ref(""), None);
    }
}
