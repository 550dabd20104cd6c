use std::path::Path;

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_client::composer::DropDraft;
use omd_client::countdown::{self, FundedCountdown};
use omd_client::hashtag::{active_quick_tags, extract_hashtags};
use omd_client::icons::{marker_icon_for, MarkerIcon};
use omd_client::install_prompt;
use omd_client::itinerary::{group_stops_by_day, trip_duration};
use omd_client::profiles::Registration;
use omd_client::routes::Route;
use omd_client::session::SessionStore;
use omd_client::state::AppState;
use omd_client::trips::TripFilter;
use omd_client::upload::MediaFile;
use omd_client::votes::VoteSession;
use omd_types::{
    CommentWithAuthor, Drop, DropPatch, DropWithStats, FollowRequest, NewStop, NewTrip,
    Notification, ProfilePhoto, ProfileUpdate, StopPatch, TopPoster, Trip, TripPatch,
};

use crate::cli::{
    AuthCommand, Command, CommentCommand, DropCommand, FollowCommand, NotificationCommand,
    ProfileCommand, PromptCommand, RatingCommand, TripCommand,
};

/// How results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn one<T: Serialize>(&self, value: &T, line: impl Fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", line(value));
        }
        Ok(())
    }

    pub fn list<T: Serialize>(&self, items: &[T], line: impl Fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(items)?);
        } else if items.is_empty() {
            println!("(none)");
        } else {
            for item in items {
                println!("{}", line(item));
            }
        }
        Ok(())
    }
}

/// Everything a command needs.
pub struct Context {
    pub state: AppState,
    pub sessions: SessionStore,
    pub out: Output,
    pub cancel: CancellationToken,
}

impl Context {
    fn me(&self) -> Result<Uuid> {
        self.state
            .auth
            .current_user_id()
            .context("Not signed in. Run `omd auth login` first")
    }

    fn user_or_me(&self, user: Option<Uuid>) -> Result<Uuid> {
        match user {
            Some(user) => Ok(user),
            None => self.me(),
        }
    }
}

pub async fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Auth(cmd) => auth(ctx, cmd).await,
        Command::Drops(cmd) => drops(ctx, cmd).await,
        Command::Comments(cmd) => comments(ctx, cmd).await,
        Command::Ratings(cmd) => ratings(ctx, cmd).await,
        Command::Follows(cmd) => follows(ctx, cmd).await,
        Command::Profiles(cmd) => profiles(ctx, cmd).await,
        Command::Notifications(cmd) => notifications(ctx, cmd).await,
        Command::Trips(cmd) => trips(ctx, cmd).await,
        Command::Tags { note, has_media } => tags(ctx.out, &note, has_media),
        Command::Countdown { fund } => countdown(ctx, fund),
        Command::InstallPrompt(cmd) => install_prompt(ctx, cmd),
        Command::Route { path } => route(ctx.out, &path),
    }
}

async fn auth(ctx: &Context, cmd: AuthCommand) -> Result<()> {
    let auth = &ctx.state.auth;
    match cmd {
        AuthCommand::Login { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            ctx.sessions.save(&session)?;
            println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&email));
        }
        AuthCommand::Register {
            email,
            password,
            display_name,
            username,
            birthdate,
            sex,
        } => {
            let outcome = auth.sign_up(&email, &password).await?;
            match (outcome.user_id, outcome.session) {
                (Some(user_id), Some(session)) => {
                    ctx.sessions.save(&session)?;
                    let registration = Registration {
                        display_name,
                        username_base: username,
                        email,
                        birthdate,
                        sex,
                    };
                    let username = ctx
                        .state
                        .profiles
                        .claim_username(user_id, &registration, &ctx.cancel)
                        .await?;
                    println!("Registered as @{}", username);
                }
                _ => println!("Check your inbox to confirm the account, then sign in."),
            }
        }
        AuthCommand::Reset { email } => {
            auth.send_password_reset(&email).await?;
            println!("If that address has an account, a reset link is on its way.");
        }
        AuthCommand::Logout => {
            if let Err(e) = auth.sign_out().await {
                tracing::warn!("Server sign-out failed: {}", e);
            }
            ctx.sessions.delete()?;
            println!("Signed out");
        }
        AuthCommand::Whoami => match auth.current_user_id() {
            Some(id) => println!("{}", id),
            None => println!("Not signed in"),
        },
    }
    Ok(())
}

async fn drops(ctx: &Context, cmd: DropCommand) -> Result<()> {
    let drops = &ctx.state.drops;
    let cancel = &ctx.cancel;
    match cmd {
        DropCommand::Feed { limit } => {
            let mut feed = drops.fetch_active_drops(cancel).await?;
            if let Some(limit) = limit {
                feed.truncate(limit);
            }
            ctx.out.list(&feed, drop_line)
        }
        DropCommand::Mine { stats: true } => {
            let mine = drops
                .fetch_my_drops_with_stats(ctx.state.auth.current_user_id(), cancel)
                .await?;
            ctx.out.list(&mine, stats_line)
        }
        DropCommand::Mine { stats: false } => {
            let mine = drops
                .fetch_my_drops(ctx.state.auth.current_user_id(), cancel)
                .await?;
            ctx.out.list(&mine, drop_line)
        }
        DropCommand::Profile { user } => {
            let pins = drops.list_drops_by_profile(Some(user), cancel).await?;
            ctx.out.list(&pins, drop_line)
        }
        DropCommand::Add {
            lat,
            lng,
            note,
            photos,
            image_url,
            link,
        } => {
            let max_files = drops.limits().composer_max_files;
            if photos.len() > max_files {
                eprintln!("Only the first {} photos will be attached", max_files);
            }
            let files = photos
                .iter()
                .take(max_files)
                .map(|p| read_media(p))
                .collect::<Result<Vec<_>>>()?;

            let mut draft = DropDraft::new(lat, lng, note).with_files(files, max_files);
            if let Some(link) = link {
                draft = draft.with_link(link);
            }
            if let Some(url) = image_url {
                draft = draft.with_image_url(url);
            }

            let drop = draft
                .submit_with(drops, ctx.state.uploader.as_ref(), ctx.state.compression, cancel)
                .await?;
            ctx.out.one(&drop, drop_line)
        }
        DropCommand::Update {
            id,
            note,
            link,
            clear_link,
            private,
        } => {
            let patch = DropPatch {
                note: note.map(Some),
                link_url: if clear_link { Some(None) } else { link.map(Some) },
                is_private: private,
                ..Default::default()
            };
            let drop = drops.update_drop(id, patch, cancel).await?;
            ctx.out.one(&drop, drop_line)
        }
        DropCommand::Delete { id } => {
            drops.delete_drop(id, cancel).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        DropCommand::Vote { id, value } => {
            let mut session = VoteSession::load(drops, id, cancel).await;
            session.vote(drops, value, cancel).await?;
            let tally = session.tally();
            let summary = json!({ "up": tally.up, "down": tally.down, "mine": tally.mine });
            ctx.out.one(&summary, |_| {
                format!("up {}  down {}  yours: {:?}", tally.up, tally.down, tally.mine)
            })
        }
        DropCommand::View { id } => {
            let outcome = drops.record_view(id, cancel).await?;
            let count = drops.get_view_count(id, cancel).await?;
            tracing::debug!("view of {}: {:?}", id, outcome);
            ctx.out.one(&count, |c| format!("{} views", c))
        }
        DropCommand::Report { id, reason } => {
            drops.report_drop(id, &reason, cancel).await?;
            println!("Thanks, the drop was reported");
            Ok(())
        }
        DropCommand::Top { limit } => {
            let posters = drops.fetch_top_posters(limit, cancel).await?;
            ctx.out.list(&posters, poster_line)
        }
    }
}

async fn comments(ctx: &Context, cmd: CommentCommand) -> Result<()> {
    let comments = &ctx.state.comments;
    match cmd {
        CommentCommand::List { drop } => {
            let list = comments.list(drop, &ctx.cancel).await?;
            ctx.out.list(&list, comment_line)
        }
        CommentCommand::Count { drop } => {
            let count = comments.count(drop, &ctx.cancel).await?;
            ctx.out.one(&count, |c| c.to_string())
        }
        CommentCommand::Post { drop, body } => {
            let comment = comments.post(drop, &body, &ctx.cancel).await?;
            ctx.out.one(&comment, |c| format!("Posted {}", c.id))
        }
    }
}

async fn ratings(ctx: &Context, cmd: RatingCommand) -> Result<()> {
    let ratings = &ctx.state.ratings;
    match cmd {
        RatingCommand::Show { pin } => {
            let summary = ratings.summary(pin, &ctx.cancel).await?;
            let mine = ratings.mine(pin, &ctx.cancel).await?;
            let value = json!({ "average": summary.average, "count": summary.count, "mine": mine });
            ctx.out.one(&value, |_| match mine {
                Some(m) => format!("{:.1} from {} ratings (yours: {})", summary.average, summary.count, m),
                None => format!("{:.1} from {} ratings", summary.average, summary.count),
            })
        }
        RatingCommand::Rate { pin, value } => {
            let summary = ratings.rate(pin, value, &ctx.cancel).await?;
            ctx.out.one(&summary, |s| format!("{:.1} from {} ratings", s.average, s.count))
        }
    }
}

async fn follows(ctx: &Context, cmd: FollowCommand) -> Result<()> {
    let follows = &ctx.state.follows;
    let cancel = &ctx.cancel;
    match cmd {
        FollowCommand::Request { user } => {
            follows.send_request(user, cancel).await?;
            println!("Follow request sent");
        }
        FollowCommand::Cancel { user } => {
            follows.cancel(user, cancel).await?;
            println!("Follow request withdrawn");
        }
        FollowCommand::Accept { user } => {
            follows.accept(user, cancel).await?;
            println!("Accepted");
        }
        FollowCommand::Reject { user } => {
            follows.reject(user, cancel).await?;
            println!("Rejected");
        }
        FollowCommand::Incoming => {
            let rows = follows.incoming(cancel).await?;
            ctx.out.list(&rows, |r| follow_line(r, r.follower_id))?;
        }
        FollowCommand::Outgoing => {
            let rows = follows.outgoing(cancel).await?;
            ctx.out.list(&rows, |r| follow_line(r, r.followed_id))?;
        }
        FollowCommand::Followers { user } => {
            let rows = follows.followers(ctx.user_or_me(user)?, cancel).await?;
            ctx.out.list(&rows, |r| follow_line(r, r.follower_id))?;
        }
        FollowCommand::Following { user } => {
            let rows = follows.following(ctx.user_or_me(user)?, cancel).await?;
            ctx.out.list(&rows, |r| follow_line(r, r.followed_id))?;
        }
        FollowCommand::Status { user } => {
            let status = follows.relationship(user, cancel).await?;
            let label = status.map(|s| s.as_str()).unwrap_or("none");
            ctx.out.one(&label, |l| l.to_string())?;
        }
    }
    Ok(())
}

async fn notifications(ctx: &Context, cmd: NotificationCommand) -> Result<()> {
    let inbox = &ctx.state.notifications;
    let cancel = &ctx.cancel;
    ctx.me()?;
    match cmd {
        NotificationCommand::Count => {
            let unread = inbox.unread_count(cancel).await?;
            ctx.out.one(&json!({ "unread": unread }), |_| format!("{} unread", unread))
        }
        NotificationCommand::List { keep_unread: true } => {
            let items = inbox.list(cancel).await?;
            ctx.out.list(&items, notification_line)
        }
        NotificationCommand::List { keep_unread: false } => {
            let items = inbox.open_inbox(cancel).await?;
            ctx.out.list(&items, notification_line)
        }
        NotificationCommand::Read => {
            inbox.mark_all_read(cancel).await?;
            println!("All caught up");
            Ok(())
        }
    }
}

async fn profiles(ctx: &Context, cmd: ProfileCommand) -> Result<()> {
    let profiles = &ctx.state.profiles;
    let cancel = &ctx.cancel;
    match cmd {
        ProfileCommand::Show { username } => {
            let profile = profiles
                .by_username(&username, cancel)
                .await?
                .with_context(|| format!("No profile named {}", username))?;
            ctx.out.one(&profile, |p| {
                format!(
                    "@{}  {}\n{}",
                    p.username,
                    p.display_name.as_deref().unwrap_or(""),
                    p.bio.as_deref().unwrap_or("")
                )
            })
        }
        ProfileCommand::Stats { user } => {
            let stats = profiles.stats(ctx.user_or_me(user)?, cancel).await?;
            ctx.out.one(&stats, |s| {
                format!(
                    "{} followers  {} following  {} drops  {} trips",
                    s.followers, s.following, s.drops, s.trips
                )
            })
        }
        ProfileCommand::Photos { user } => {
            let photos = profiles.photos(ctx.user_or_me(user)?, cancel).await?;
            ctx.out.list(&photos, photo_line)
        }
        ProfileCommand::Edit {
            display_name,
            bio,
            photo_url,
            banner_url,
            discoverable,
        } => {
            let update = ProfileUpdate {
                display_name,
                bio,
                photo_url,
                banner_url,
                discoverable,
            };
            let profile = profiles.update_own(&update, cancel).await?;
            ctx.out.one(&profile, |p| format!("Updated @{}", p.username))
        }
        ProfileCommand::AddPhoto { url, caption, private } => {
            let photo = profiles
                .add_photo(&url, caption.as_deref(), private, cancel)
                .await?;
            ctx.out.one(&photo, photo_line)
        }
        ProfileCommand::DeletePhoto { id } => {
            profiles.delete_photo(id, cancel).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

async fn trips(ctx: &Context, cmd: TripCommand) -> Result<()> {
    let trips = &ctx.state.trips;
    let cancel = &ctx.cancel;
    match cmd {
        TripCommand::List { owner, limit, offset } => {
            let filter = TripFilter {
                owner,
                viewer: ctx.state.auth.current_user_id(),
                limit,
                offset,
            };
            let list = trips.list(filter, cancel).await?;
            ctx.out.list(&list, trip_line)
        }
        TripCommand::Show { id } => {
            let trip = trips
                .get(id, cancel)
                .await?
                .with_context(|| format!("Trip {} not found", id))?;
            let stops = trips.stops(id, cancel).await?;
            let days = trip_duration(&trip, &stops);

            if ctx.out.json {
                let value = json!({ "trip": trip, "days": days, "stops": stops });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            println!("{} ({} days)", trip_line(&trip), days);
            for day in group_stops_by_day(&stops) {
                println!("{}", day.label());
                for stop in &day.stops {
                    println!(
                        "  {:>5}  {}{}",
                        stop.time.as_deref().unwrap_or(""),
                        stop.title,
                        stop.note.as_deref().map(|n| format!(" - {}", n)).unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
        TripCommand::Create {
            title,
            description,
            start,
            end,
            private,
        } => {
            let trip = NewTrip {
                user_id: ctx.me()?,
                title,
                description,
                start_date: start,
                end_date: end,
                is_private: private,
                image_url: None,
            };
            let created = trips.create(&trip, cancel).await?;
            ctx.out.one(&created, trip_line)
        }
        TripCommand::Update {
            id,
            title,
            description,
            start,
            end,
            private,
        } => {
            let patch = TripPatch {
                title,
                description: description.map(Some),
                start_date: start.map(Some),
                end_date: end.map(Some),
                is_private: private,
                image_url: None,
            };
            let updated = trips.update(id, &patch, cancel).await?;
            ctx.out.one(&updated, trip_line)
        }
        TripCommand::Delete { id } => {
            trips.delete(id, cancel).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        TripCommand::AddStop {
            trip,
            title,
            day,
            order,
            lat,
            lng,
            note,
            time,
        } => {
            let stop = NewStop {
                trip_id: trip,
                day_index: day,
                order_index: order,
                title,
                lat,
                lng,
                note,
                time,
            };
            let created = trips.add_stop(&stop, cancel).await?;
            ctx.out.one(&created, |s| format!("{}  Day {}  {}", s.id, s.day_index + 1, s.title))
        }
        TripCommand::UpdateStop {
            id,
            title,
            day,
            order,
            note,
            time,
        } => {
            let patch = StopPatch {
                day_index: day,
                order_index: order,
                title,
                note: note.map(Some),
                time: time.map(Some),
                ..Default::default()
            };
            let updated = trips.update_stop(id, &patch, cancel).await?;
            ctx.out.one(&updated, |s| format!("{}  Day {}  {}", s.id, s.day_index + 1, s.title))
        }
        TripCommand::DeleteStop { id } => {
            trips.delete_stop(id, cancel).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

fn tags(out: Output, note: &str, has_media: bool) -> Result<()> {
    let value = json!({
        "hashtags": extract_hashtags(note),
        "quick_tags": active_quick_tags(note),
        "icon": marker_icon_for(Some(note), has_media).as_str(),
    });
    out.one(&value, |v| {
        format!(
            "hashtags: {}\nquick tags: {}\nicon: {}",
            v["hashtags"], v["quick_tags"], v["icon"]
        )
    })
}

fn countdown(ctx: &Context, fund: Option<f64>) -> Result<()> {
    let store = ctx.state.store.as_ref();
    if let Some(usd) = fund {
        countdown::set_funded_usd(store, usd)?;
    }
    let c = FundedCountdown::from_store(store, Utc::now());
    let value = json!({
        "deadline": c.deadline,
        "remaining_seconds": c.remaining.num_seconds(),
        "funded_usd": c.funded_usd,
        "destroyed": c.destroyed(),
    });
    ctx.out.one(&value, |_| {
        format!("{}  (funded ${:.2} = {:.1} extra days)", c, c.funded_usd, c.funded_days())
    })
}

fn install_prompt(ctx: &Context, cmd: PromptCommand) -> Result<()> {
    let store = ctx.state.store.as_ref();
    match cmd {
        PromptCommand::Status => {
            let show = install_prompt::should_show(store, Utc::now());
            ctx.out.one(&show, |s| if *s { "shown" } else { "hidden" }.to_string())
        }
        PromptCommand::Dismiss => {
            install_prompt::dismiss(store, Utc::now())?;
            println!("Hidden for a week");
            Ok(())
        }
    }
}

fn route(out: Output, path: &str) -> Result<()> {
    let resolved = Route::parse(path);
    let value = json!({
        "path": resolved.route.path(),
        "redirected": resolved.redirected,
        "requires_sign_in": resolved.route.requires_sign_in(),
    });
    out.one(&value, |_| {
        let mut line = format!("{:?} -> {}", resolved.route, resolved.route);
        if resolved.redirected {
            line.push_str(" (redirected)");
        }
        if resolved.route.requires_sign_in() {
            line.push_str(" [sign-in required]");
        }
        line
    })
}

/// Load a photo from disk for the composer.
pub fn read_media(path: &Path) -> Result<MediaFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo.jpg")
        .to_string();
    let content_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => bail!("{} is not a supported image", path.display()),
    };
    Ok(MediaFile::new(name, content_type, bytes))
}

pub fn drop_line(drop: &Drop) -> String {
    let author = drop
        .username
        .as_deref()
        .map(|u| format!(" @{}", u))
        .unwrap_or_default();
    format!(
        "{}  [{}]  {:.5},{:.5}{}  {}",
        drop.id,
        MarkerIcon::for_drop(drop).as_str(),
        drop.lat,
        drop.lng,
        author,
        drop.note.as_deref().unwrap_or("")
    )
}

fn stats_line(drop: &DropWithStats) -> String {
    format!(
        "{}  {} views  +{} -{}  {}",
        drop.id,
        drop.view_count,
        drop.up_count,
        drop.down_count,
        drop.note.as_deref().unwrap_or("")
    )
}

fn poster_line(poster: &TopPoster) -> String {
    format!(
        "{:>4}  @{}  {}",
        poster.pin_count,
        poster.username.as_deref().unwrap_or("?"),
        poster.display_name.as_deref().unwrap_or("")
    )
}

fn comment_line(entry: &CommentWithAuthor) -> String {
    let who = entry
        .author
        .as_ref()
        .and_then(|a| a.username.as_deref())
        .unwrap_or("someone");
    format!("@{}: {}", who, entry.comment.comment)
}

fn follow_line(request: &FollowRequest, other: Uuid) -> String {
    format!("{}  {}", other, request.status.as_str())
}

fn notification_line(n: &Notification) -> String {
    let marker = if n.is_read { " " } else { "*" };
    let when = n
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("{} {}  {}", marker, when, n.message.as_deref().unwrap_or(""))
}

fn photo_line(photo: &ProfilePhoto) -> String {
    let lock = if photo.is_private { " (private)" } else { "" };
    format!("{}  {}{}", photo.id, photo.url, lock)
}

pub fn trip_line(trip: &Trip) -> String {
    let dates = match (trip.start_date, trip.end_date) {
        (Some(start), Some(end)) => format!("  {} to {}", start, end),
        (Some(start), None) => format!("  from {}", start),
        _ => String::new(),
    };
    let lock = if trip.is_private { " (private)" } else { "" };
    format!("{}  {}{}{}", trip.id, trip.title, dates, lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn drop_with(note: &str, username: Option<&str>) -> Drop {
        serde_json::from_value(json!({
            "id": Uuid::nil(),
            "lat": 1.5,
            "lng": -2.25,
            "note": note,
            "username": username,
        }))
        .unwrap()
    }

    #[test]
    fn test_drop_line_shows_icon_and_author() {
        let line = drop_line(&drop_with("#gas fill up", Some("rider0001")));
        assert!(line.contains("[gas]"), "{}", line);
        assert!(line.contains("@rider0001"));
        assert!(line.contains("1.50000,-2.25000"));
    }

    #[test]
    fn test_notification_line_marks_unread() {
        let n: Notification = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "recipient": Uuid::nil(),
            "message": "rider0001 rated your drop",
            "created_at": "2025-03-02T08:30:00Z",
        }))
        .unwrap();
        assert_eq!(notification_line(&n), "* 2025-03-02 08:30  rider0001 rated your drop");
    }

    #[test]
    fn test_read_media_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Shot.PNG");
        std::fs::File::create(&path).unwrap().write_all(b"png").unwrap();

        let file = read_media(&path).unwrap();
        assert_eq!(file.name, "Shot.PNG");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, b"png");
    }

    #[test]
    fn test_read_media_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hi").unwrap();
        assert!(read_media(&path).is_err());
        assert!(read_media(&dir.path().join("missing.jpg")).is_err());
    }

    #[test]
    fn test_trip_line_dates() {
        let trip: Trip = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "user_id": Uuid::nil(),
            "title": "Coast run",
            "start_date": "2025-03-01",
            "end_date": "2025-03-04",
            "is_private": true,
        }))
        .unwrap();
        let line = trip_line(&trip);
        assert!(line.ends_with("Coast run  2025-03-01 to 2025-03-04 (private)"), "{}", line);
    }
}
