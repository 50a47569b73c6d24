use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandResult};
use serenity::model::channel::Message;
use tracing::info;

use super::{check_msg, exec_tracker, sandbox};
use crate::exec;

#[group]
#[commands(run, languages)]
pub struct Exec;

#[command]
#[aliases("eval", "exec")]
async fn run(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let sandbox = sandbox(ctx).await;
    let reply = exec::build_reply(&sandbox, args.rest()).await;

    match msg.channel_id.say(&ctx.http, reply).await {
        Ok(sent) => {
            // Remembered so an edited invocation reruns into the same reply.
            exec_tracker(ctx)
                .await
                .remember(msg.id, msg.channel_id, sent.id);
        }
        Err(why) => info!("Error sending message: {why:?}"),
    }

    Ok(())
}

#[command]
#[aliases("langs")]
async fn languages(ctx: &Context, msg: &Message) -> CommandResult {
    let listing = exec::languages::listing();
    check_msg(
        msg.channel_id
            .say(&ctx.http, format!("I can run:\n```{listing}```"))
            .await,
    );

    Ok(())
}
