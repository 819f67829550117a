use serde::{Deserialize, Serialize};

pub const EXPO_PREFIX: &str = "ExponentPushToken";
const MIN_FCM_TOKEN_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenKind {
    Expo,
    Fcm,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedToken {
    pub kind: TokenKind,
    pub normalized: String,
}

/// Strips provider prefixes such as `project:token`.
///
/// Expo tokens are never split. With exactly one colon and a non-empty tail the tail
/// is the token; any other colon layout keeps the longest segment, first one on ties.
pub fn normalize(token: &str) -> &str {
    if token.starts_with(EXPO_PREFIX) || !token.contains(':') {
        return token;
    }

    let segments = token.split(':');
    if token.matches(':').count() == 1 {
        if let Some(tail) = segments.clone().nth(1) {
            if !tail.is_empty() {
                return tail;
            }
        }
    }

    segments.fold("", |best, seg| if seg.len() > best.len() { seg } else { best })
}

pub fn classify(token: &str) -> ClassifiedToken {
    let normalized = normalize(token);
    let kind = if normalized.starts_with(EXPO_PREFIX) {
        TokenKind::Expo
    } else if is_valid_fcm_token(normalized) {
        TokenKind::Fcm
    } else {
        TokenKind::Invalid
    };

    ClassifiedToken {
        kind,
        normalized: normalized.to_string(),
    }
}

fn is_valid_fcm_token(token: &str) -> bool {
    token.len() >= MIN_FCM_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}
