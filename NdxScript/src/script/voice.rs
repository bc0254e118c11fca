//! Leading voice tags
//!
//! Voiced lines start with a tag such as `<VSM_0012>`, `<VCT_b01>`, `<S12>`
//! or `<C3>`. The tag is kept apart from the text so translators do not
//! have to carry it along.

/// Split a leading voice tag off `text`.
///
/// Returns the tag without brackets (if any) and the remaining text.
pub fn split_voice(text: &str) -> (Option<String>, &str) {
    let Some(inner_end) = text.strip_prefix('<').and_then(|rest| rest.find('>')) else {
        return (None, text);
    };
    let inner = &text[1..=inner_end];
    if is_voice_id(inner) {
        (Some(inner.to_string()), &text[inner_end + 2..])
    } else {
        (None, text)
    }
}

/// Re-prepend a voice tag.
pub fn join_voice(voice_id: Option<&str>, text: &str) -> String {
    match voice_id {
        Some(voice) => format!("<{voice}>{text}"),
        None => text.to_string(),
    }
}

fn is_voice_id(inner: &str) -> bool {
    if let Some(rest) = inner.strip_prefix("VSM_").or_else(|| inner.strip_prefix("VCT_")) {
        return all_of(rest, |c| c.is_alphanumeric() || c == '_');
    }
    if let Some(rest) = inner.strip_prefix('S').or_else(|| inner.strip_prefix('C')) {
        return all_of(rest, |c| c.is_ascii_digit());
    }
    false
}

fn all_of(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_voice() {
        assert_eq!(
            split_voice("<VSM_0012>Hello"),
            (Some("VSM_0012".to_string()), "Hello")
        );
        assert_eq!(split_voice("<S12>"), (Some("S12".to_string()), ""));
        assert_eq!(split_voice("<C3>Hm<Wait>"), (Some("C3".to_string()), "Hm<Wait>"));
        assert_eq!(split_voice("<Wait>Hello"), (None, "<Wait>Hello"));
        assert_eq!(split_voice("<Sx>Hello"), (None, "<Sx>Hello"));
        assert_eq!(split_voice("Hi <S1>"), (None, "Hi <S1>"));
        assert_eq!(split_voice("<VSM_"), (None, "<VSM_"));
    }

    #[test]
    fn test_join_voice() {
        assert_eq!(join_voice(Some("S12"), "Hi"), "<S12>Hi");
        assert_eq!(join_voice(None, "Hi"), "Hi");
    }
}
