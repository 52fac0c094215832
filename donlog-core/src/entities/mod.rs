pub mod events;
pub mod player_events;
pub mod players;
pub mod seasons;
pub mod subscriptions;
