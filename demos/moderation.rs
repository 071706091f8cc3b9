//! Minimal launcher: listen to moderation actions on one channel and print
//! them. Expects a real OAuth token; run with `RUST_LOG=debug` to watch the
//! connection lifecycle.

use twitch_pubsub::TwitchPubSubClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let user_id = "117166826";
    let channel_id = "11148817";

    // OAuth token for user_id with the channel:moderate scope
    let user_token = "abcdef123456";

    let mut client = TwitchPubSubClient::builder().build()?;

    client.on_chat_moderator_action(|channel, action| {
        println!(
            "[{}] {} {} on {}",
            channel, action.created_by, action.moderation_action, action.target_user_id,
        );
    });

    client
        .listen_chat_moderator_actions(user_id, channel_id, user_token)
        .await;

    // Blocks until disconnect() is called; this demo never does.
    client.start().await?;
    Ok(())
}
