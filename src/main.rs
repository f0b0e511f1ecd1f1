use std::{collections::HashMap, sync::Arc};

use homepro::config::Config;
use homepro::handlers::{
    forward_notifications, handle_callback_query, handle_command, handle_text, BotState, Command,
};
use homepro::marketplace::Marketplace;
use homepro::seed;
use homepro::smart_match::KeywordClassifier;
use homepro::store::open_repository;
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt},
    prelude::*,
    types::{CallbackQuery, Message},
};
use tokio::sync::Mutex;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let repo = match open_repository(&config.storage()).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("could not open the entity store: {e}");
            std::process::exit(1);
        }
    };

    let market = Marketplace::new(repo).with_latency(config.simulated_latency);
    let categories = match market.categories().await {
        Ok(categories) => categories,
        Err(e) => {
            warn!("could not load categories for matching, using built-in ones: {e}");
            seed::dataset(chrono::Utc::now()).categories
        }
    };
    let state = BotState {
        market,
        classifier: Arc::new(KeywordClassifier::new(categories)),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        chat_poll_interval: config.chat_poll_interval,
    };

    let bot = Bot::from_env();
    tokio::spawn(forward_notifications(bot.clone(), state.clone()));
    info!("homepro bot starting");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint({
                    let state = state.clone();
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let state = state.clone();
                        async move { handle_command(bot, msg, cmd, state).await }
                    }
                }),
        )
        .branch(Update::filter_message().endpoint(handle_text))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();
            move |bot: Bot, q: CallbackQuery| {
                let state = state.clone();
                async move { handle_callback_query(bot, q, state).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
