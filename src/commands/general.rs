use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::CommandResult;
use serenity::model::channel::Message;

use super::check_msg;

#[group]
#[commands(ping, help)]
pub struct General;

#[command]
async fn ping(ctx: &Context, msg: &Message) -> CommandResult {
    check_msg(msg.channel_id.say(&ctx.http, "Pong!").await);

    Ok(())
}

#[command]
async fn help(ctx: &Context, msg: &Message) -> CommandResult {
    let message = r#"
**Music:**
    **play [URL|title]** - Queues a track, playlist, or search result.
    **pause / resume / skip / stop / shuffle / clear** - Vote-gated playback actions; the DJ and moderators act instantly.
    **queue** - Shows the queued tracks.
    **nowplaying** - Reposts the playback status message.
    **volume [1-100]** - Shows or sets the volume (DJ only).
    **seek [seconds]** - Jumps inside the current track (DJ only).
    **dj [@member]** - Hands the decks to someone else.
    **join / leave** - Voice channel management.
**Code:**
    **run** - Runs a fenced code block in the sandbox; edit your message to rerun.
    **languages** - Lists what I can run.
**Settings:**
    **settings** - Shows this guild's configuration.
    **setvolume / settimeout / djrole / logchannel** - Tunes it (Manage Server only).
    "#;

    check_msg(msg.channel_id.say(&ctx.http, message).await);

    Ok(())
}
