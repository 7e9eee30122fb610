//! Caption generation for social posts
//!
//! Captions vary by platform, session count, live status, and credit
//! style, and pick up game and holiday hashtags. Duplicated hashtags are
//! removed case-insensitively, first spelling wins.

use chrono::NaiveDate;

use super::handles::{game_handle, game_hashtags};
use super::holiday::current_holiday;
use super::Platform;

/// Everything the caption needs to know about one post
#[derive(Debug, Clone)]
pub struct CaptionContext<'a> {
    pub game_name: &'a str,
    pub game_installment: Option<&'a str>,
    pub top_label: &'a str,
    pub top_value: i64,
    pub games_played: i64,
    pub is_live: bool,
    pub credit_style: &'a str,
    pub channel_handle: &'a str,
}

/// Build the caption for one platform.
pub fn generate_post_caption(ctx: &CaptionContext, platform: Platform, today: NaiveDate) -> String {
    let full_game_name = match ctx.game_installment {
        Some(inst) if !inst.is_empty() => format!("{}: {}", ctx.game_name, inst),
        _ => ctx.game_name.to_string(),
    };

    let handle = game_handle(ctx.game_name, platform);
    let credit_line = handle.map(|h| credit_line(ctx.credit_style, h));

    let mut caption = String::new();
    let mut hashtags: Vec<String> = Vec::new();

    if ctx.is_live {
        caption.push_str("🔴 LIVE NOW! 🔴\n");
    }

    if ctx.games_played == 1 {
        caption.push_str(&format!("🎮 First game on {full_game_name}! 🎮\n"));
    } else {
        caption.push_str(&format!("📊 {full_game_name} Progress Report! 📊\n"));
    }

    if let Some(line) = credit_line {
        caption.push_str(&line);
        caption.push('\n');
    }

    if ctx.games_played > 1 {
        caption.push_str(&format!("\nGames Played: {}\n", ctx.games_played));
        caption.push_str(&format!(
            "🔥 Latest {}: {}\n",
            ctx.top_label.to_uppercase(),
            ctx.top_value
        ));
    } else {
        caption.push_str(&format!(
            "\n🔥 {}: {}\n",
            ctx.top_label.to_uppercase(),
            ctx.top_value
        ));
    }

    if ctx.is_live && !ctx.channel_handle.is_empty() {
        match platform {
            Platform::Twitter => {
                caption.push_str(&format!("\nWatch live: twitch.tv/{}\n", ctx.channel_handle));
            }
            Platform::Instagram => {
                caption.push_str("\n🔗 Link in bio to watch live!\n");
            }
        }
    }

    // Base hashtags per platform and state
    let base: &[&str] = match (platform, ctx.is_live) {
        (Platform::Twitter, true) => &["#Live", "#Gaming", "#LiveStream"],
        (Platform::Twitter, false) => &["#Gaming", "#Stats", "#GamingAnalytics"],
        (Platform::Instagram, true) => &["#live", "#gaming", "#livestream"],
        (Platform::Instagram, false) => &["#gaming", "#stats", "#gaminganalytics"],
    };
    hashtags.extend(base.iter().map(|s| s.to_string()));

    hashtags.extend(
        game_hashtags(ctx.game_name, platform)
            .iter()
            .map(|s| s.to_string()),
    );

    if let Some(holiday) = current_holiday(today) {
        hashtags.push(holiday.hashtag().to_string());
    }

    caption.push('\n');
    caption.push_str(&dedup_hashtags(hashtags).join(" "));
    caption.push('\n');

    // Keep live captions uncluttered; plug the channel when offline.
    if !ctx.is_live && !ctx.channel_handle.is_empty() {
        caption.push_str(&format!("\n📺 Watch: twitch.tv/{}", ctx.channel_handle));
    }

    caption
}

fn credit_line(style: &str, handle: &str) -> String {
    match style {
        "credit" => format!("Game Credit: {handle}"),
        "props" => format!("Props to {handle}"),
        "playing" => format!("Playing {handle}"),
        "respect" => format!("Respect {handle}"),
        "vibes" => format!("Vibes: {handle}"),
        "powered" => format!("Powered by {handle}"),
        "courtesy" => format!("Courtesy of {handle}"),
        "ft" => format!("ft. {handle}"),
        "brought" => format!("Brought to you by {handle}"),
        // "shoutout" and anything unknown
        _ => format!("S/O {handle}"),
    }
}

/// Case-insensitive dedup preserving first occurrence order
fn dedup_hashtags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for tag in tags {
        if seen.insert(tag.to_lowercase()) {
            unique.push(tag);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(games_played: i64, is_live: bool) -> CaptionContext<'a> {
        CaptionContext {
            game_name: "Apex Legends",
            game_installment: None,
            top_label: "Eliminations",
            top_value: 15,
            games_played,
            is_live,
            credit_style: "shoutout",
            channel_handle: "TheBroadcast",
        }
    }

    fn plain_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 20).unwrap()
    }

    #[test]
    fn test_first_game_caption() {
        let caption = generate_post_caption(&ctx(1, false), Platform::Twitter, plain_day());
        assert!(caption.contains("First game on Apex Legends"));
        assert!(caption.contains("🔥 ELIMINATIONS: 15"));
        assert!(caption.contains("S/O @PlayApex"));
        assert!(caption.contains("#ApexLegends"));
        assert!(!caption.contains("Games Played"));
        assert!(caption.contains("twitch.tv/TheBroadcast"));
    }

    #[test]
    fn test_progress_caption() {
        let caption = generate_post_caption(&ctx(5, false), Platform::Twitter, plain_day());
        assert!(caption.contains("Progress Report"));
        assert!(caption.contains("Games Played: 5"));
        assert!(caption.contains("Latest ELIMINATIONS: 15"));
    }

    #[test]
    fn test_live_caption_has_header_and_stream_link() {
        let caption = generate_post_caption(&ctx(1, true), Platform::Twitter, plain_day());
        assert!(caption.starts_with("🔴 LIVE NOW! 🔴"));
        assert!(caption.contains("Watch live: twitch.tv/TheBroadcast"));
        assert!(caption.contains("#LiveStream"));
        // The offline channel plug is replaced by the live link
        assert!(!caption.contains("📺 Watch:"));
    }

    #[test]
    fn test_instagram_live_uses_bio_link() {
        let caption = generate_post_caption(&ctx(2, true), Platform::Instagram, plain_day());
        assert!(caption.contains("🔗 Link in bio to watch live!"));
        assert!(!caption.contains("twitch.tv"));
        assert!(caption.contains("#livestream"));
    }

    #[test]
    fn test_holiday_hashtag_included() {
        let christmas = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        let caption = generate_post_caption(&ctx(1, false), Platform::Twitter, christmas);
        assert!(caption.contains("#Christmas"));
    }

    #[test]
    fn test_unknown_game_has_no_credit_line() {
        let mut context = ctx(1, false);
        context.game_name = "Obscure Indie Game";
        let caption = generate_post_caption(&context, Platform::Twitter, plain_day());
        assert!(!caption.contains("S/O"));
        assert!(caption.contains("#Gaming"));
    }

    #[test]
    fn test_credit_styles() {
        assert_eq!(credit_line("props", "@EA"), "Props to @EA");
        assert_eq!(credit_line("ft", "@EA"), "ft. @EA");
        assert_eq!(credit_line("nonsense", "@EA"), "S/O @EA");
    }

    #[test]
    fn test_hashtag_dedup_case_insensitive() {
        let tags = vec![
            "#Gaming".to_string(),
            "#gaming".to_string(),
            "#Stats".to_string(),
        ];
        assert_eq!(dedup_hashtags(tags), vec!["#Gaming", "#Stats"]);
    }
}
