use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// Photos are only ever sampled from these years onwards.
pub(crate) const PHOTO_EPOCH_YEAR: i32 = 2010;

// Apple photo edit sidecars; never worth a manual spot-check.
regex!(BANNED_KEY_REGEX, r"(?i)aae$");
// `YYYY-MM/<rest>` photo keys are stored locally as `YYYY/<rest>`.
regex!(PHOTO_KEY_REGEX, r"^(\d{4})-\d{2}/(.+)$");

pub(crate) fn is_banned(key: &str) -> bool {
    BANNED_KEY_REGEX.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2020-01/IMG_0001.AAE", true)]
    #[case("2020-01/IMG_0001.aae", true)]
    #[case("2020-01/IMG_0001.HEIC", false)]
    #[case("shows/aae/episode.mkv", false)]
    fn test_banned_keys(#[case] key: &str, #[case] banned: bool) {
        assert_eq!(is_banned(key), banned);
    }

    #[test]
    fn test_photo_key_captures() {
        let captures = PHOTO_KEY_REGEX.captures("2021-07/holiday/beach.jpg").unwrap();
        assert_eq!(&captures[1], "2021");
        assert_eq!(&captures[2], "holiday/beach.jpg");
        assert!(PHOTO_KEY_REGEX.captures("misc/2021-07/beach.jpg").is_none());
        assert!(PHOTO_KEY_REGEX.captures("2021-07/").is_none());
    }
}
