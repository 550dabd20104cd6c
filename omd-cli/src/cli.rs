use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use omd_client::trips::DEFAULT_PAGE_SIZE;
use omd_types::VoteValue;

/// One More Day - drop pins, plan trips and follow people from the terminal
#[derive(Parser, Debug)]
#[command(name = "omd")]
#[command(about = "Command line client for the One More Day map")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to ./omd.toml)
    #[arg(long, short, env = "OMD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Log to this file instead of stderr
    #[arg(long, env = "OMD_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in, register, reset a password or sign out
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Pins on the map
    #[command(subcommand)]
    Drops(DropCommand),
    #[command(subcommand)]
    Comments(CommentCommand),
    #[command(subcommand)]
    Ratings(RatingCommand),
    #[command(subcommand)]
    Follows(FollowCommand),
    #[command(subcommand)]
    Profiles(ProfileCommand),
    /// Your notification inbox
    #[command(subcommand)]
    Notifications(NotificationCommand),
    /// Trips and their day-by-day stops
    #[command(subcommand)]
    Trips(TripCommand),
    /// Show hashtags, active quick tags and the marker icon for a note
    Tags {
        note: String,
        #[arg(long)]
        has_media: bool,
    },
    /// Time left on the funded countdown
    Countdown {
        /// Record a new funded amount in USD first
        #[arg(long)]
        fund: Option<f64>,
    },
    /// "Add to home screen" hint state
    #[command(subcommand)]
    InstallPrompt(PromptCommand),
    /// Resolve an app path to its screen
    Route { path: String },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    Login {
        email: String,
        #[arg(long, env = "OMD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and claim a unique username
    Register {
        email: String,
        #[arg(long, env = "OMD_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
        /// Username stem; digits are appended
        #[arg(long)]
        username: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        birthdate: Option<NaiveDate>,
        #[arg(long)]
        sex: Option<String>,
    },
    /// Email a password reset link
    Reset { email: String },
    Logout,
    Whoami,
}

#[derive(Subcommand, Debug)]
pub enum DropCommand {
    /// Public feed, newest first
    Feed {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Your own pins
    Mine {
        /// Include view and vote totals
        #[arg(long)]
        stats: bool,
    },
    /// Pins shown on someone's profile
    Profile { user: Uuid },
    /// Create a pin. The note needs at least one #hashtag
    Add {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        note: String,
        /// Image to attach; repeatable
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
        /// Already hosted image, used when no photo is attached
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        link: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, conflicts_with = "clear_link")]
        link: Option<String>,
        #[arg(long)]
        clear_link: bool,
        #[arg(long)]
        private: Option<bool>,
    },
    Delete { id: Uuid },
    /// Vote up, down or clear; pressing the same vote again clears it
    Vote {
        id: Uuid,
        #[arg(value_parser = parse_vote)]
        value: VoteValue,
    },
    /// Record a view and print the total
    View { id: Uuid },
    Report {
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Users with the most pins
    Top {
        #[arg(long, default_value_t = omd_client::drops::DEFAULT_TOP_POSTERS)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    List { drop: Uuid },
    Count { drop: Uuid },
    Post { drop: Uuid, body: String },
}

#[derive(Subcommand, Debug)]
pub enum RatingCommand {
    Show { pin: Uuid },
    Rate {
        pin: Uuid,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        value: u8,
    },
}

#[derive(Subcommand, Debug)]
pub enum FollowCommand {
    Request { user: Uuid },
    Cancel { user: Uuid },
    Accept { user: Uuid },
    Reject { user: Uuid },
    /// Pending requests to you
    Incoming,
    /// Pending requests you sent
    Outgoing,
    Followers { user: Option<Uuid> },
    Following { user: Option<Uuid> },
    /// Your relationship with a user
    Status { user: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
    /// Number of unread notifications
    Count,
    /// Newest first. Listing marks everything read.
    List {
        #[arg(long)]
        keep_unread: bool,
    },
    /// Mark everything read
    Read,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show { username: String },
    Stats { user: Option<Uuid> },
    Photos { user: Option<Uuid> },
    Edit {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
        #[arg(long)]
        banner_url: Option<String>,
        #[arg(long)]
        discoverable: Option<bool>,
    },
    AddPhoto {
        url: String,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        private: bool,
    },
    DeletePhoto { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum TripCommand {
    List {
        /// Whose trips (defaults to yours)
        #[arg(long)]
        owner: Option<Uuid>,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Trip details with its itinerary grouped by day
    Show { id: Uuid },
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        private: bool,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        private: Option<bool>,
    },
    Delete { id: Uuid },
    AddStop {
        trip: Uuid,
        title: String,
        /// Zero-based day
        #[arg(long, default_value_t = 0)]
        day: i32,
        #[arg(long, default_value_t = 0)]
        order: i32,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    UpdateStop {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        day: Option<i32>,
        #[arg(long)]
        order: Option<i32>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    DeleteStop { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum PromptCommand {
    /// Whether the hint would be shown now
    Status,
    /// Hide the hint for a week
    Dismiss,
}

fn parse_vote(s: &str) -> Result<VoteValue, String> {
    VoteValue::parse(s).ok_or_else(|| format!("expected up, down or clear, got '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_drop() {
        let cli = Cli::try_parse_from([
            "omd", "drops", "add", "--lat", "-33.86", "--lng", "151.2", "--note", "#coffee stop",
            "--photo", "a.jpg", "--photo", "b.png",
        ])
        .unwrap();
        match cli.command {
            Command::Drops(DropCommand::Add { lat, photos, note, .. }) => {
                assert_eq!(lat, -33.86);
                assert_eq!(photos.len(), 2);
                assert_eq!(note, "#coffee stop");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_notifications() {
        let cli = Cli::try_parse_from(["omd", "notifications", "list", "--keep-unread"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Notifications(NotificationCommand::List { keep_unread: true })
        ));
        let cli = Cli::try_parse_from(["omd", "--json", "notifications", "count"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Notifications(NotificationCommand::Count)));
    }

    #[test]
    fn test_vote_values() {
        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["omd", "drops", "vote", &id, "down"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Drops(DropCommand::Vote { value: VoteValue::Down, .. })
        ));
        assert!(Cli::try_parse_from(["omd", "drops", "vote", &id, "sideways"]).is_err());
    }

    #[test]
    fn test_rating_range_enforced() {
        let id = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["omd", "ratings", "rate", &id, "5"]).is_ok());
        assert!(Cli::try_parse_from(["omd", "ratings", "rate", &id, "6"]).is_err());
    }

    #[test]
    fn test_json_flag_is_global() {
        let cli = Cli::try_parse_from(["omd", "trips", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Trips(TripCommand::List { limit: DEFAULT_PAGE_SIZE, offset: 0, owner: None })
        ));
    }
}
