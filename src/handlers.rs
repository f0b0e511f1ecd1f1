use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message},
    utils::command::BotCommands,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{MarketplaceError, Result};
use crate::feed::poll_chat;
use crate::marketplace::{BookingRequest, Marketplace};
use crate::models::{Booking, BookingStatus, GeoPoint, Provider, Quote, RequestType};
use crate::quote::QuoteDraft;
use crate::smart_match::{smart_match, Classifier};
use crate::workflow::{allowed_targets, Actor};

pub type HandlerResult = std::result::Result<(), Box<dyn Error + Send + Sync>>;

const STATUS_CALLBACK: &str = "status";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "HomePro commands:")]
pub enum Command {
    #[command(description = "show this help")]
    Help,
    #[command(description = "sign in as a customer or provider: /login <user id>")]
    Login(String),
    #[command(description = "list service categories")]
    Categories,
    #[command(description = "top providers on the platform")]
    Featured,
    #[command(description = "list providers: /providers [category]")]
    Providers(String),
    #[command(description = "search providers: /search <text>")]
    Search(String),
    #[command(description = "provider profile: /provider <id>")]
    Provider(String),
    #[command(
        description = "request a service: /book provider | service | YYYY-MM-DD | HH:MM | type | address [| notes]"
    )]
    Book(String),
    #[command(description = "your bookings")]
    Bookings,
    #[command(description = "change a booking status: /status <booking> <status>")]
    Status(String),
    #[command(description = "send a quote: /quote booking | item:cost; item:cost [| notes]")]
    Quote(String),
    #[command(description = "review a completed booking: /review <booking> <1-5> <comment>")]
    Review(String),
    #[command(description = "your notifications")]
    Notifications,
    #[command(description = "mark all notifications read")]
    Read,
    #[command(description = "open a booking chat: /chat <booking>")]
    Chat(String),
    #[command(description = "send a chat message: /say <booking> <text>")]
    Say(String),
    #[command(description = "stop following the open chat")]
    Leave,
    #[command(description = "add or remove a favorite provider: /favorite <provider>")]
    Favorite(String),
    #[command(description = "your favorite providers")]
    Favorites,
    #[command(description = "your earnings")]
    Earnings,
    #[command(description = "describe a job and get matching providers: /match <description>")]
    Match(String),
    #[command(description = "manage portfolio images: /portfolio add|remove <url>")]
    Portfolio(String),
    #[command(description = "set your service location: /location <lat> <lng>")]
    Location(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub actor: Actor,
}

#[derive(Default)]
pub struct Session {
    identity: Option<Identity>,
    // Booking id and the task forwarding its messages.
    chat: Option<(String, JoinHandle<()>)>,
}

impl Session {
    fn leave_chat(&mut self) -> Option<String> {
        let (booking_id, task) = self.chat.take()?;
        task.abort();
        Some(booking_id)
    }
}

pub type Sessions = Arc<Mutex<HashMap<i64, Session>>>;

#[derive(Clone)]
pub struct BotState {
    pub market: Marketplace,
    pub classifier: Arc<dyn Classifier>,
    pub sessions: Sessions,
    pub chat_poll_interval: Duration,
}

impl BotState {
    async fn identity(&self, chat_id: ChatId) -> Option<Identity> {
        let sessions = self.sessions.lock().await;
        sessions.get(&chat_id.0).and_then(|s| s.identity.clone())
    }

    async fn chats_for(&self, user_id: &str) -> Vec<ChatId> {
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .filter(|(_, s)| s.identity.as_ref().is_some_and(|i| i.user_id == user_id))
            .map(|(chat, _)| ChatId(*chat))
            .collect()
    }
}

struct Reply {
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: BotState) -> HandlerResult {
    let chat_id = msg.chat.id;
    let replies = match run_command(&bot, chat_id, cmd, &state).await {
        Ok(replies) => replies,
        Err(e) => {
            warn!("command in chat {} failed: {e}", chat_id.0);
            vec![Reply::text(e.user_message())]
        }
    };

    for reply in replies {
        let mut request = bot.send_message(chat_id, reply.text);
        if let Some(keyboard) = reply.keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
    }
    Ok(())
}

pub async fn handle_text(bot: Bot, msg: Message) -> HandlerResult {
    if msg.text().is_some() {
        bot.send_message(msg.chat.id, "I did not understand that. Try /help.")
            .await?;
    }
    Ok(())
}

pub async fn handle_callback_query(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let Some((booking_id, to)) = q.data.as_deref().and_then(parse_callback) else {
        warn!("unexpected callback data {:?}", q.data);
        return Ok(());
    };

    let Some(identity) = state.identity(chat_id).await else {
        bot.send_message(chat_id, not_logged_in().user_message()).await?;
        return Ok(());
    };

    match change_status(&state.market, &identity, &booking_id, to).await {
        Ok(booking) => {
            let mut edit = bot.edit_message_text(chat_id, message.id(), format_booking(&booking));
            if let Some(keyboard) = status_keyboard(identity.actor, &booking) {
                edit = edit.reply_markup(keyboard);
            }
            edit.await?;
        }
        Err(e) => {
            warn!("status button in chat {} failed: {e}", chat_id.0);
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }
    Ok(())
}

/// Pushes every stored notification to the chats signed in as its recipient.
pub async fn forward_notifications(bot: Bot, state: BotState) {
    let mut feed = state.market.subscribe();
    loop {
        match feed.recv().await {
            Ok(notification) => {
                for chat_id in state.chats_for(&notification.user_id).await {
                    let text = format!("🔔 {}", notification.message);
                    if let Err(e) = bot.send_message(chat_id, text).await {
                        warn!("could not deliver notification {}: {e}", notification.id);
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("notification forwarder skipped {skipped} notification(s)");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run_command(bot: &Bot, chat_id: ChatId, cmd: Command, state: &BotState) -> Result<Vec<Reply>> {
    let market = &state.market;
    let identity = state.identity(chat_id).await;

    let reply = match cmd {
        Command::Help => Reply::text(Command::descriptions().to_string()),
        Command::Login(user_id) => {
            let identity = login(market, user_id.trim()).await?;
            let text = format!("Signed in as {} ({}).", identity.name, identity.actor);
            info!("chat {} signed in as {} {}", chat_id.0, identity.actor, identity.user_id);
            let mut sessions = state.sessions.lock().await;
            let session = sessions.entry(chat_id.0).or_default();
            session.leave_chat();
            session.identity = Some(identity);
            Reply::text(text)
        }
        Command::Categories => {
            let categories = market.categories().await?;
            let lines: Vec<String> = categories
                .iter()
                .map(|c| format!("• {}: {}", c.name, c.subcategories.join(", ")))
                .collect();
            Reply::text(lines.join("\n"))
        }
        Command::Featured => Reply::text(format_provider_list(&market.featured_providers().await?)),
        Command::Providers(category) => {
            let category = category.trim();
            let providers = market
                .list_providers((!category.is_empty()).then_some(category), None)
                .await?;
            Reply::text(format_provider_list(&providers))
        }
        Command::Search(text) => {
            let providers = market.list_providers(None, Some(&text)).await?;
            Reply::text(format_provider_list(&providers))
        }
        Command::Provider(id) => {
            let id = id.trim();
            let provider = market
                .provider(id)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("provider", id))?;
            Reply::text(format_provider(&provider))
        }
        Command::Book(args) => {
            let me = require(identity, Actor::Customer)?;
            let request = parse_booking_args(&args, &me)?;
            let provider_id = request.provider_id.clone();
            let booking = market
                .create_booking(request)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("provider or service", provider_id))?;
            let keyboard = status_keyboard(me.actor, &booking);
            Reply {
                text: format!("Request sent!\n\n{}", format_booking(&booking)),
                keyboard,
            }
        }
        Command::Bookings => {
            let me = require_any(identity)?;
            let bookings = match me.actor {
                Actor::Customer => market.bookings_for_customer(&me.user_id).await?,
                Actor::Provider => market.bookings_for_provider(&me.user_id).await?,
            };
            if bookings.is_empty() {
                return Ok(vec![Reply::text("You have no bookings yet.")]);
            }
            return Ok(bookings
                .iter()
                .map(|b| Reply {
                    text: format_booking(b),
                    keyboard: status_keyboard(me.actor, b),
                })
                .collect());
        }
        Command::Status(args) => {
            let me = require_any(identity)?;
            let (booking_id, to) = parse_status_args(&args)?;
            let booking = change_status(market, &me, &booking_id, to).await?;
            Reply {
                text: format_booking(&booking),
                keyboard: status_keyboard(me.actor, &booking),
            }
        }
        Command::Quote(args) => {
            let me = require(identity, Actor::Provider)?;
            let (booking_id, quote) = parse_quote_args(&args)?;
            participant_booking(market, &me, &booking_id).await?;
            let booking = market
                .send_quote(&booking_id, quote)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("booking", &booking_id))?;
            Reply::text(format!("Quote sent.\n\n{}", format_booking(&booking)))
        }
        Command::Review(args) => {
            let me = require(identity, Actor::Customer)?;
            let (booking_id, rating, comment) = parse_review_args(&args)?;
            participant_booking(market, &me, &booking_id).await?;
            let provider = market
                .submit_review(&booking_id, rating, &comment, &me.name)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("booking", &booking_id))?;
            Reply::text(format!(
                "Thanks for your review! {} is now rated {:.1}.",
                provider.business_name, provider.rating
            ))
        }
        Command::Notifications => {
            let me = require_any(identity)?;
            let notifications = market.notifications(&me.user_id).await?;
            if notifications.is_empty() {
                Reply::text("No notifications yet.")
            } else {
                let lines: Vec<String> = notifications
                    .iter()
                    .map(|n| {
                        let marker = if n.read { "  " } else { "• " };
                        format!("{marker}{} ({})", n.message, n.created_at.format("%Y-%m-%d %H:%M"))
                    })
                    .collect();
                Reply::text(lines.join("\n"))
            }
        }
        Command::Read => {
            let me = require_any(identity)?;
            let count = market.mark_all_read(&me.user_id).await?;
            Reply::text(format!("Marked {count} notification(s) as read."))
        }
        Command::Chat(booking_id) => {
            let me = require_any(identity)?;
            let booking = participant_booking(market, &me, booking_id.trim()).await?;
            let history = market.messages(&booking.id).await?;
            open_chat(bot, chat_id, state, &booking.id).await;

            let mut text = format!("💬 Chat for {} ({})\n", booking.service_name, booking.id);
            if history.is_empty() {
                text.push_str("\nNo messages yet.");
            }
            for message in &history {
                text.push('\n');
                text.push_str(&format_chat_message(message));
            }
            text.push_str("\n\nReply with /say <booking> <text>. /leave stops following.");
            Reply::text(text)
        }
        Command::Say(args) => {
            let me = require_any(identity)?;
            let (booking_id, text) = args
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| MarketplaceError::validation("Usage: /say <booking> <text>"))?;
            market
                .send_message(booking_id, &me.user_id, text)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("booking", booking_id))?;
            Reply::text("Sent.")
        }
        Command::Leave => {
            let mut sessions = state.sessions.lock().await;
            match sessions.get_mut(&chat_id.0).and_then(Session::leave_chat) {
                Some(booking_id) => Reply::text(format!("Stopped following chat {booking_id}.")),
                None => Reply::text("No chat is open."),
            }
        }
        Command::Favorite(provider_id) => {
            let me = require(identity, Actor::Customer)?;
            let provider_id = provider_id.trim();
            let provider = market
                .provider(provider_id)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("provider", provider_id))?;
            let text = if market.toggle_favorite(&me.user_id, provider_id).await? {
                format!("⭐ {} added to favorites.", provider.business_name)
            } else {
                format!("{} removed from favorites.", provider.business_name)
            };
            Reply::text(text)
        }
        Command::Favorites => {
            let me = require(identity, Actor::Customer)?;
            Reply::text(format_provider_list(&market.favorite_providers(&me.user_id).await?))
        }
        Command::Earnings => {
            let me = require(identity, Actor::Provider)?;
            let summary = market.earnings_summary(&me.user_id).await?;
            let mut text = format!(
                "💰 This month: {}\nPending payout: {}\nTotal: {}\n",
                summary.this_month, summary.pending_payout, summary.total
            );
            for earning in market.earnings_for_provider(&me.user_id).await? {
                text.push_str(&format!(
                    "\n{} {} {} (payout {}, {:?})",
                    earning.booking_date, earning.service_name, earning.amount_earned, earning.payout_date, earning.status
                ));
            }
            Reply::text(text)
        }
        Command::Match(description) => {
            let result = smart_match(market, state.classifier.as_ref(), &description).await?;
            Reply::text(format!(
                "🔎 {}\nCategory: {}\n\n{}",
                result.suggestion.reasoning,
                result.suggestion.category,
                format_provider_list(&result.providers)
            ))
        }
        Command::Portfolio(args) => {
            let me = require(identity, Actor::Provider)?;
            let (action, url) = args
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| MarketplaceError::validation("Usage: /portfolio add|remove <url>"))?;
            let provider = match action {
                "add" => market.add_portfolio_image(&me.user_id, url).await?,
                "remove" => market.remove_portfolio_image(&me.user_id, url).await?,
                _ => return Err(MarketplaceError::validation("Usage: /portfolio add|remove <url>")),
            }
            .ok_or_else(|| MarketplaceError::not_found("provider", &me.user_id))?;
            Reply::text(format!("Portfolio now has {} image(s).", provider.portfolio.len()))
        }
        Command::Location(args) => {
            let me = require(identity, Actor::Provider)?;
            let location = parse_location(&args)?;
            market
                .update_provider_location(&me.user_id, location)
                .await?
                .ok_or_else(|| MarketplaceError::not_found("provider", &me.user_id))?;
            Reply::text(format!("Location set to {}, {}.", location.lat, location.lng))
        }
    };
    Ok(vec![reply])
}

async fn login(market: &Marketplace, user_id: &str) -> Result<Identity> {
    if let Some(customer) = market.customer(user_id).await? {
        return Ok(Identity {
            user_id: customer.id,
            name: customer.name,
            actor: Actor::Customer,
        });
    }
    if let Some(provider) = market.provider(user_id).await? {
        return Ok(Identity {
            user_id: provider.id,
            name: provider.name,
            actor: Actor::Provider,
        });
    }
    Err(MarketplaceError::not_found("user", user_id))
}

async fn open_chat(bot: &Bot, chat_id: ChatId, state: &BotState, booking_id: &str) {
    let mut subscription = poll_chat(state.market.clone(), booking_id, state.chat_poll_interval);
    let bot = bot.clone();
    let task = tokio::spawn(async move {
        while let Some(message) = subscription.next().await {
            if let Err(e) = bot.send_message(chat_id, format_chat_message(&message)).await {
                warn!("could not forward message {}: {e}", message.id);
            }
        }
    });

    let mut sessions = state.sessions.lock().await;
    let session = sessions.entry(chat_id.0).or_default();
    session.leave_chat();
    session.chat = Some((booking_id.to_string(), task));
}

/// Loads a booking the signed-in user takes part in.
async fn participant_booking(market: &Marketplace, me: &Identity, booking_id: &str) -> Result<Booking> {
    let booking = market
        .booking(booking_id)
        .await?
        .ok_or_else(|| MarketplaceError::not_found("booking", booking_id))?;
    let party = match me.actor {
        Actor::Customer => &booking.customer_id,
        Actor::Provider => &booking.provider_id,
    };
    if *party != me.user_id {
        return Err(MarketplaceError::not_found("booking", booking_id));
    }
    Ok(booking)
}

async fn change_status(
    market: &Marketplace,
    me: &Identity,
    booking_id: &str,
    to: BookingStatus,
) -> Result<Booking> {
    participant_booking(market, me, booking_id).await?;
    market
        .set_booking_status(booking_id, to, me.actor)
        .await?
        .ok_or_else(|| MarketplaceError::not_found("booking", booking_id))
}

fn not_logged_in() -> MarketplaceError {
    MarketplaceError::validation("Please sign in first with /login <user id>.")
}

fn require_any(identity: Option<Identity>) -> Result<Identity> {
    identity.ok_or_else(not_logged_in)
}

fn require(identity: Option<Identity>, actor: Actor) -> Result<Identity> {
    let identity = require_any(identity)?;
    if identity.actor != actor {
        return Err(MarketplaceError::validation(format!(
            "Only a {actor} can do that."
        )));
    }
    Ok(identity)
}

fn usage(text: &str) -> MarketplaceError {
    MarketplaceError::validation(format!("Usage: {text}"))
}

pub fn parse_booking_args(args: &str, customer: &Identity) -> Result<BookingRequest> {
    const USAGE: &str = "/book provider | service | YYYY-MM-DD | HH:MM | type | address [| notes]";

    let parts: Vec<&str> = args.split('|').map(str::trim).collect();
    if !(6..=7).contains(&parts.len()) {
        return Err(usage(USAGE));
    }
    let date = NaiveDate::parse_from_str(parts[2], "%Y-%m-%d")
        .map_err(|_| MarketplaceError::validation(format!("'{}' is not a date (YYYY-MM-DD).", parts[2])))?;
    let time = NaiveTime::parse_from_str(parts[3], "%H:%M")
        .map_err(|_| MarketplaceError::validation(format!("'{}' is not a time (HH:MM).", parts[3])))?;
    let request_type: RequestType = parts[4].parse().map_err(MarketplaceError::Validation)?;

    Ok(BookingRequest {
        customer_id: customer.user_id.clone(),
        customer_name: customer.name.clone(),
        provider_id: parts[0].to_string(),
        service_name: parts[1].to_string(),
        date,
        time,
        request_type,
        address: parts[5].to_string(),
        notes: parts.get(6).map(|n| n.to_string()).filter(|n| !n.is_empty()),
    })
}

pub fn parse_status_args(args: &str) -> Result<(String, BookingStatus)> {
    let (booking_id, status) = args
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| usage("/status <booking> <status>"))?;
    let status = status.parse().map_err(MarketplaceError::Validation)?;
    Ok((booking_id.to_string(), status))
}

pub fn parse_quote_args(args: &str) -> Result<(String, Quote)> {
    const USAGE: &str = "/quote booking | item:cost; item:cost [| notes]";

    let parts: Vec<&str> = args.split('|').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) || parts[0].is_empty() {
        return Err(usage(USAGE));
    }
    let mut draft = QuoteDraft::parse_items(parts[1])?;
    if let Some(notes) = parts.get(2) {
        draft = draft.notes(*notes);
    }
    Ok((parts[0].to_string(), draft.validate()?))
}

pub fn parse_review_args(args: &str) -> Result<(String, u8, String)> {
    let mut parts = args.trim().splitn(3, char::is_whitespace);
    let (Some(booking_id), Some(rating)) = (parts.next(), parts.next()) else {
        return Err(usage("/review <booking> <1-5> <comment>"));
    };
    let rating = rating
        .parse::<u8>()
        .map_err(|_| MarketplaceError::validation("Please select a star rating."))?;
    let comment = parts.next().unwrap_or_default().trim().to_string();
    Ok((booking_id.to_string(), rating, comment))
}

pub fn parse_location(args: &str) -> Result<GeoPoint> {
    let coords: Vec<f64> = args
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| usage("/location <lat> <lng>"))?;
    match coords[..] {
        [lat, lng] => Ok(GeoPoint { lat, lng }),
        _ => Err(usage("/location <lat> <lng>")),
    }
}

pub fn parse_callback(data: &str) -> Option<(String, BookingStatus)> {
    let mut parts = data.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(STATUS_CALLBACK), Some(booking_id), Some(status), None) if !booking_id.is_empty() => {
            Some((booking_id.to_string(), status.parse().ok()?))
        }
        _ => None,
    }
}

fn action_label(to: BookingStatus, booking: &Booking) -> &'static str {
    match to {
        BookingStatus::Confirmed if booking.status == BookingStatus::QuoteSent => "✅ Accept quote",
        BookingStatus::Confirmed => "✅ Confirm",
        BookingStatus::Declined => "🚫 Decline",
        BookingStatus::OnTheWay => "🚐 On my way",
        BookingStatus::Completed => "🏁 Mark completed",
        BookingStatus::Cancelled => "❌ Cancel",
        other => other.label(),
    }
}

/// One button per move `actor` may make, or `None` when there is nothing
/// left to do.
pub fn status_keyboard(actor: Actor, booking: &Booking) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = allowed_targets(actor, booking)
        .into_iter()
        .map(|to| {
            vec![InlineKeyboardButton::callback(
                action_label(to, booking),
                format!("{STATUS_CALLBACK}:{}:{}", booking.id, to.as_str()),
            )]
        })
        .collect();
    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

pub fn format_booking(booking: &Booking) -> String {
    let mut text = format!(
        "📋 {} ({})\n{} with {}\nCustomer: {}\n📅 {} at {}\n📍 {} ({})\n{}",
        booking.service_name,
        booking.id,
        booking.status.label(),
        booking.provider_name,
        booking.customer_name,
        booking.date.format("%Y-%m-%d"),
        booking.time.format("%H:%M"),
        booking.address,
        booking.request_type,
        match booking.price {
            Some(price) => format!("💵 {price}"),
            None => "💵 Awaiting quote".to_string(),
        },
    );
    if let Some(notes) = &booking.notes {
        text.push_str(&format!("\nNotes: {notes}"));
    }
    if let Some(quote) = &booking.quote {
        text.push_str("\n\nQuote:");
        for item in quote.items() {
            text.push_str(&format!("\n  {}: {}", item.description, item.cost));
        }
        text.push_str(&format!("\n  Total: {}", quote.total()));
        if let Some(notes) = quote.provider_notes() {
            text.push_str(&format!("\n  {notes}"));
        }
    }
    text
}

fn format_provider_list(providers: &[Provider]) -> String {
    if providers.is_empty() {
        return "No providers found.".to_string();
    }
    providers
        .iter()
        .map(|p| {
            let top = if p.vetting.is_top_pro { " 🏆" } else { "" };
            format!("{}. {}{} ({}) ★{:.1}", p.id, p.business_name, top, p.category, p.rating)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_provider(provider: &Provider) -> String {
    let mut text = format!(
        "{} ({})\n{} · ★{:.1} from {} review(s)\n\n{}\n\nServices:",
        provider.business_name,
        provider.name,
        provider.category,
        provider.rating,
        provider.reviews.len(),
        provider.description,
    );
    for service in &provider.services {
        text.push_str(&format!(
            "\n  {} from {} ({:?})",
            service.name, service.starting_price, service.pricing_model
        ));
    }
    let vetting = provider.vetting;
    text.push_str(&format!(
        "\n\nBackground checked: {}\nSkills verified: {}\nReferences checked: {}",
        yes_no(vetting.background_checked),
        yes_no(vetting.skills_verified),
        yes_no(vetting.references_checked),
    ));
    for review in provider.reviews.iter().take(3) {
        text.push_str(&format!(
            "\n\n{} {}/5 ({})\n{}",
            review.author_name, review.rating, review.date, review.comment
        ));
    }
    text
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn format_chat_message(message: &crate::models::Message) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M"),
        message.sender_name,
        message.text
    )
}
