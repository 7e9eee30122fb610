//! Game social-media handles and hashtags
//!
//! Static lookup table keyed by lowercased game or publisher name.
//! Unknown games simply post without a credit line or game hashtags.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::Platform;

/// Handle and hashtags for one game on one platform
#[derive(Debug, Clone, Copy)]
pub struct PlatformSocial {
    pub handle: &'static str,
    pub hashtags: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
struct GameSocial {
    instagram: PlatformSocial,
    twitter: PlatformSocial,
}

macro_rules! social {
    ($ig_handle:literal, $ig_tags:expr, $tw_handle:literal, $tw_tags:expr) => {
        GameSocial {
            instagram: PlatformSocial {
                handle: $ig_handle,
                hashtags: $ig_tags,
            },
            twitter: PlatformSocial {
                handle: $tw_handle,
                hashtags: $tw_tags,
            },
        }
    };
}

static GAME_SOCIAL_DATA: Lazy<HashMap<&'static str, GameSocial>> = Lazy::new(|| {
    HashMap::from([
        // Games
        (
            "call of duty",
            social!(
                "@callofduty",
                &["#callofduty", "#codwarzone"],
                "@CallofDuty",
                &["#CallofDuty", "#Warzone"]
            ),
        ),
        (
            "fortnite",
            social!(
                "@fortnite",
                &["#fortnite", "#fortnitebr"],
                "@FortniteGame",
                &["#Fortnite", "#FortniteBR"]
            ),
        ),
        (
            "apex legends",
            social!(
                "@playapex",
                &["#apexlegends", "#playapex"],
                "@PlayApex",
                &["#ApexLegends", "#PlayApex"]
            ),
        ),
        (
            "valorant",
            social!(
                "@valorant",
                &["#valorant", "#valorantclips"],
                "@VALORANT",
                &["#VALORANT", "#ValorantClips"]
            ),
        ),
        (
            "overwatch",
            social!(
                "@playoverwatch",
                &["#overwatch", "#overwatch2"],
                "@PlayOverwatch",
                &["#Overwatch", "#Overwatch2"]
            ),
        ),
        (
            "halo",
            social!(
                "@halo",
                &["#halo", "#haloinfinite"],
                "@Halo",
                &["#Halo", "#HaloInfinite"]
            ),
        ),
        (
            "rocket league",
            social!(
                "@rocketleague",
                &["#rocketleague", "#rlcs"],
                "@RocketLeague",
                &["#RocketLeague", "#RLCS"]
            ),
        ),
        (
            "minecraft",
            social!(
                "@minecraft",
                &["#minecraft", "#minecraftbuilds"],
                "@Minecraft",
                &["#Minecraft", "#MinecraftBuilds"]
            ),
        ),
        (
            "league of legends",
            social!(
                "@leagueoflegends",
                &["#leagueoflegends", "#leagueclips"],
                "@LeagueOfLegends",
                &["#LeagueOfLegends", "#LeagueClips"]
            ),
        ),
        (
            "mario kart",
            social!(
                "@nintendo",
                &["#mariokart", "#nintendo"],
                "@Nintendo",
                &["#MarioKart", "#Nintendo"]
            ),
        ),
        // Publishers & studios
        (
            "electronic arts",
            social!(
                "@ea",
                &["#ea", "#electronicarts"],
                "@EA",
                &["#EA", "#ElectronicArts"]
            ),
        ),
        (
            "ea",
            social!(
                "@ea",
                &["#ea", "#electronicarts"],
                "@EA",
                &["#EA", "#ElectronicArts"]
            ),
        ),
        (
            "activision",
            social!(
                "@activision",
                &["#activision", "#callofduty"],
                "@Activision",
                &["#Activision", "#CallOfDuty"]
            ),
        ),
        (
            "blizzard",
            social!(
                "@blizzard_ent",
                &["#blizzard", "#overwatch"],
                "@Blizzard_Ent",
                &["#Blizzard", "#Overwatch"]
            ),
        ),
        (
            "ubisoft",
            social!(
                "@ubisoft",
                &["#ubisoft", "#assassinscreed"],
                "@Ubisoft",
                &["#Ubisoft", "#AssassinsCreed"]
            ),
        ),
    ])
});

fn lookup(game_name: &str, platform: Platform) -> Option<PlatformSocial> {
    let entry = GAME_SOCIAL_DATA.get(game_name.to_lowercase().as_str())?;
    Some(match platform {
        Platform::Instagram => entry.instagram,
        Platform::Twitter => entry.twitter,
    })
}

/// Social handle for a game on a platform, if known
pub fn game_handle(game_name: &str, platform: Platform) -> Option<&'static str> {
    lookup(game_name, platform).map(|s| s.handle)
}

/// Hashtags for a game on a platform; empty when unknown
pub fn game_hashtags(game_name: &str, platform: Platform) -> &'static [&'static str] {
    lookup(game_name, platform).map(|s| s.hashtags).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            game_handle("Call of Duty", Platform::Instagram),
            Some("@callofduty")
        );
        assert_eq!(
            game_handle("FORTNITE", Platform::Twitter),
            Some("@FortniteGame")
        );
    }

    #[test]
    fn test_unknown_game() {
        assert_eq!(game_handle("Obscure Indie Game", Platform::Twitter), None);
        assert!(game_hashtags("Obscure Indie Game", Platform::Twitter).is_empty());
    }

    #[test]
    fn test_platforms_differ() {
        assert_eq!(
            game_hashtags("valorant", Platform::Twitter),
            &["#VALORANT", "#ValorantClips"]
        );
        assert_eq!(
            game_hashtags("valorant", Platform::Instagram),
            &["#valorant", "#valorantclips"]
        );
    }
}
