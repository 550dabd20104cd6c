// Library exports for omd-client
// The CLI and integration tests build on these modules

pub mod api;
pub mod comments;
pub mod composer;
pub mod config;
pub mod countdown;
pub mod drops;
pub mod follows;
pub mod hashtag;
pub mod icons;
pub mod install_prompt;
pub mod itinerary;
pub mod links;
pub mod notifications;
pub mod profiles;
pub mod ratings;
pub mod retry;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod trips;
pub mod upload;
pub mod views;
pub mod votes;

#[cfg(test)]
mod test_support;
