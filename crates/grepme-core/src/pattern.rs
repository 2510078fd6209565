//! Pattern compilation for message text and conversation names.

use regex::{Regex, RegexBuilder};

use crate::{CoreError, Result};

/// Compile `fragments` into one regex matching any of them.
///
/// Fragments are regular expressions and are joined with `|` as given, so
/// `["foo", "ba+r"]` becomes `foo|ba+r`.
///
/// # Errors
///
/// Returns [`CoreError::Config`] when no fragment is given and
/// [`CoreError::Pattern`] when the joined expression does not compile.
pub fn build_alternation<S: AsRef<str>>(fragments: &[S], ignore_case: bool) -> Result<Regex> {
    if fragments.is_empty() {
        return Err(CoreError::Config("no pattern given".to_string()));
    }

    let joined = fragments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("|");
    log::debug!("compiled pattern: {joined:?} (ignore case: {ignore_case})");

    Ok(RegexBuilder::new(&joined)
        .case_insensitive(ignore_case)
        .build()?)
}
