use super::super::domain::{word_count, ApplicationRecord, Specialization};
use super::schema::{FieldKind, FieldRule, Format, Presence};

const REQUIRED_MESSAGE: &str = "this field is required";

/// Evaluate one rule against the record, returning the first failing message.
pub(crate) fn check_rule(rule: &FieldRule, record: &ApplicationRecord) -> Option<String> {
    if !record.is_present(rule.field) {
        return match rule.presence {
            Presence::Required => Some(REQUIRED_MESSAGE.to_string()),
            Presence::Optional => None,
        };
    }

    if let Some(message) = check_kind(rule, record) {
        return Some(message);
    }

    let value = record.field_text(rule.field).unwrap_or_default().trim();
    rule.formats
        .iter()
        .find_map(|format| check_format(*format, value))
}

fn check_kind(rule: &FieldRule, record: &ApplicationRecord) -> Option<String> {
    let value = record.field_text(rule.field).unwrap_or_default().trim();
    match &rule.kind {
        FieldKind::Text => None,
        FieldKind::Reference => {
            if value.chars().any(char::is_whitespace) {
                Some("must be a file or record reference".to_string())
            } else {
                None
            }
        }
        FieldKind::Url => {
            if is_url_shaped(value) {
                None
            } else {
                Some("must be a valid http(s) URL".to_string())
            }
        }
        FieldKind::OneOf(options) => {
            if options.contains(value) {
                None
            } else {
                Some("must be one of the listed options".to_string())
            }
        }
        FieldKind::Specialization { options } => match &record.specialization_area {
            Some(Specialization::Listed(choice)) if !options.contains(choice.trim()) => {
                Some("select one of the listed specializations".to_string())
            }
            _ => None,
        },
    }
}

fn check_format(format: Format, value: &str) -> Option<String> {
    match format {
        Format::MinLength(minimum) => {
            let length = value.chars().count();
            (length < minimum).then(|| format!("must be at least {minimum} characters"))
        }
        Format::MinWords(minimum) => {
            let words = word_count(value);
            (words < minimum)
                .then(|| format!("must contain at least {minimum} words (currently {words})"))
        }
        Format::Email => {
            (!is_email_shaped(value)).then(|| "must be a valid email address".to_string())
        }
    }
}

pub(crate) fn is_email_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

pub(crate) fn is_url_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    let Some(rest) = rest else {
        return false;
    };
    let host = rest
        .split(|ch: char| ch == '/' || ch == '?' || ch == '#')
        .next()
        .unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host == "localhost"
        || (host.contains('.') && !host.starts_with('.') && !host.ends_with('.'))
}
