//! Cleaning user-supplied names before they reach a request URL or the terminal.

use std::sync::LazyLock;

use regex::Regex;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->|<[^>]*>",
    )
    .expect("markup pattern is valid")
});

/// Whether `c` may appear in a sanitized name.
#[must_use]
pub fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '@' | '-')
}

/// Remove markup (tags, comments, and the bodies of `script`/`style`
/// elements) from `text`, leaving everything else untouched.
///
/// ```
/// use taken::sanitize::strip_markup;
/// assert_eq!(strip_markup("A <b>fast</b> parser"), "A fast parser");
/// ```
#[must_use]
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").into_owned()
}

/// Sanitize a candidate package name.
///
/// Markup is stripped first, then every character outside
/// `[A-Za-z0-9._/@-]` is dropped. The result may be empty.
///
/// ```
/// use taken::sanitize::sanitize;
/// assert_eq!(sanitize("<em>left-pad</em>"), "left-pad");
/// assert_eq!(sanitize("@types/node"), "@types/node");
/// assert_eq!(sanitize("   "), "");
/// ```
#[must_use]
pub fn sanitize(raw: &str) -> String {
    strip_markup(raw).chars().filter(|&c| is_allowed(c)).collect()
}
