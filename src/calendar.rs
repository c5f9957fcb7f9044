//! Calendar rendering of a post collection.
//!
//! Pure formatting: groups posts by calendar day in a target timezone and
//! renders one header per date with a time-ordered line per post. Knows
//! nothing about caching or fetching.

use crate::vk::WallPost;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Calendar formatting failure.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The timezone string is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// Renders the postponed-post calendar.
///
/// Dates appear in ascending order; posts within a date are sorted by
/// time of day. Each line carries the post permalink and, when the post has
/// audio attachments, an `artist - title` listing.
///
/// # Errors
///
/// [`CalendarError::InvalidTimezone`] when `timezone` does not parse;
/// this is the only failure mode.
pub fn format_calendar(posts: &[WallPost], timezone: &str) -> Result<String, CalendarError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| CalendarError::InvalidTimezone(timezone.to_string()))?;

    let mut by_date: BTreeMap<NaiveDate, Vec<&WallPost>> = BTreeMap::new();
    for post in posts {
        let Some(local) = local_time(post.date, tz) else {
            warn!(
                owner_id = post.owner_id,
                id = post.id,
                date = post.date,
                "skipping post with out-of-range timestamp"
            );
            continue;
        };
        by_date.entry(local.date_naive()).or_default().push(post);
    }

    let mut output = String::new();
    for (date, mut day_posts) in by_date {
        day_posts.sort_by_key(|p| p.date);
        output.push_str(&format!("\n📅 {}:\n", date.format("%d.%m.%Y")));
        for post in day_posts {
            output.push_str(&format_line(post, tz));
            output.push('\n');
        }
    }
    Ok(output)
}

fn format_line(post: &WallPost, tz: Tz) -> String {
    // Timestamp validity was already established during grouping.
    let time = local_time(post.date, tz)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();

    let mut line = format!("{}: {}", time, post.permalink());

    let audios: Vec<String> = post.audios().map(|a| a.artist_title()).collect();
    if !audios.is_empty() {
        line.push_str(" | 🎧: ");
        line.push_str(&audios.join("; "));
    }
    line
}

fn local_time(unix: i64, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(unix, 0).map(|utc| utc.with_timezone(&tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk::{Attachment, Audio};

    fn post(id: i64, date: i64) -> WallPost {
        WallPost {
            id,
            owner_id: -100,
            signer_id: 0,
            date,
            text: String::new(),
            attachments: vec![],
        }
    }

    fn with_audio(mut p: WallPost, artist: &str, title: &str) -> WallPost {
        p.attachments.push(Attachment {
            kind: "audio".to_string(),
            photo: None,
            video: None,
            audio: Some(Audio {
                id: 1,
                owner_id: 2,
                artist: artist.to_string(),
                title: title.to_string(),
            }),
            doc: None,
        });
        p
    }

    // 2024-01-01 09:00:00 UTC
    const JAN1_MORNING: i64 = 1_704_099_600;
    // 2024-01-01 23:59:00 UTC
    const JAN1_NIGHT: i64 = 1_704_153_540;
    // 2024-01-02 00:01:00 UTC
    const JAN2_PAST_MIDNIGHT: i64 = 1_704_153_660;

    #[test]
    fn groups_same_day_into_one_bucket() {
        // Insertion order deliberately reversed; output must sort by time.
        let posts = vec![post(2, JAN1_NIGHT), post(1, JAN1_MORNING)];
        let rendered = format_calendar(&posts, "UTC").expect("valid timezone");

        assert_eq!(rendered.matches("📅").count(), 1);
        assert!(rendered.contains("📅 01.01.2024:"));
        let morning = rendered.find("09:00: vk.com/wall-100_1").expect("morning line");
        let night = rendered.find("23:59: vk.com/wall-100_2").expect("night line");
        assert!(morning < night, "lines must ascend by time of day");
    }

    #[test]
    fn past_midnight_starts_new_bucket() {
        let posts = vec![
            post(1, JAN1_MORNING),
            post(2, JAN1_NIGHT),
            post(3, JAN2_PAST_MIDNIGHT),
        ];
        let rendered = format_calendar(&posts, "UTC").expect("valid timezone");

        assert_eq!(rendered.matches("📅").count(), 2);
        let jan1 = rendered.find("📅 01.01.2024:").expect("first header");
        let jan2 = rendered.find("📅 02.01.2024:").expect("second header");
        assert!(jan1 < jan2, "dates must ascend");
        assert!(rendered.contains("00:01: vk.com/wall-100_3"));
    }

    #[test]
    fn bucketing_respects_timezone() {
        // 23:59 UTC is already the next day one hour to the east.
        let posts = vec![post(1, JAN1_NIGHT)];
        let rendered = format_calendar(&posts, "Europe/Moscow").expect("valid timezone");
        assert!(rendered.contains("📅 02.01.2024:"));
        assert!(rendered.contains("02:59: vk.com/wall-100_1"));
    }

    #[test]
    fn audio_attachments_render_inline() {
        let posts = vec![with_audio(
            with_audio(post(1, JAN1_MORNING), "Kino", "Gruppa krovi"),
            "Akvarium",
            "Gorod zolotoy",
        )];
        let rendered = format_calendar(&posts, "UTC").expect("valid timezone");
        assert!(rendered.contains("| 🎧: Kino - Gruppa krovi; Akvarium - Gorod zolotoy"));
    }

    #[test]
    fn invalid_timezone_is_an_error() {
        let result = format_calendar(&[], "Mars/Olympus_Mons");
        assert!(matches!(result, Err(CalendarError::InvalidTimezone(_))));
    }

    #[test]
    fn empty_collection_renders_empty() {
        let rendered = format_calendar(&[], "UTC").expect("valid timezone");
        assert!(rendered.is_empty());
    }
}
