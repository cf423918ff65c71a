// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;

use jid::Jid;
use xmlstream::{single, wrap, Iter, StartElement, Token, TokenReader};

use crate::error::Error;
use crate::ns;

/// The `type` attribute of an `<error/>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Do not retry (the error is unrecoverable).
    Cancel,
    /// Retry after providing credentials.
    Auth,
    /// Proceed (the condition was only a warning).
    Continue,
    /// Retry after changing the request.
    Modify,
    /// Retry after waiting.
    Wait,
}

impl ErrorType {
    /// The wire token for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Cancel => "cancel",
            ErrorType::Auth => "auth",
            ErrorType::Continue => "continue",
            ErrorType::Modify => "modify",
            ErrorType::Wait => "wait",
        }
    }

    /// Parse an `ErrorType` from its wire token.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "cancel" => Ok(ErrorType::Cancel),
            "auth" => Ok(ErrorType::Auth),
            "continue" => Ok(ErrorType::Continue),
            "modify" => Ok(ErrorType::Modify),
            "wait" => Ok(ErrorType::Wait),
            other => Err(Error::InvalidAttribute("type", other.to_string())),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The defined stanza error conditions of RFC 6120 §8.3.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinedCondition {
    BadRequest,
    Conflict,
    FeatureNotImplemented,
    Forbidden,
    Gone(Option<String>),
    InternalServerError,
    ItemNotFound,
    JidMalformed,
    NotAcceptable,
    NotAllowed,
    NotAuthorized,
    PolicyViolation,
    RecipientUnavailable,
    Redirect(Option<String>),
    RegistrationRequired,
    RemoteServerNotFound,
    RemoteServerTimeout,
    ResourceConstraint,
    ServiceUnavailable,
    SubscriptionRequired,
    UndefinedCondition,
    UnexpectedRequest,
}

impl DefinedCondition {
    /// The element local name this condition marshals as.
    pub fn local_name(&self) -> &'static str {
        match self {
            DefinedCondition::BadRequest => "bad-request",
            DefinedCondition::Conflict => "conflict",
            DefinedCondition::FeatureNotImplemented => "feature-not-implemented",
            DefinedCondition::Forbidden => "forbidden",
            DefinedCondition::Gone(_) => "gone",
            DefinedCondition::InternalServerError => "internal-server-error",
            DefinedCondition::ItemNotFound => "item-not-found",
            DefinedCondition::JidMalformed => "jid-malformed",
            DefinedCondition::NotAcceptable => "not-acceptable",
            DefinedCondition::NotAllowed => "not-allowed",
            DefinedCondition::NotAuthorized => "not-authorized",
            DefinedCondition::PolicyViolation => "policy-violation",
            DefinedCondition::RecipientUnavailable => "recipient-unavailable",
            DefinedCondition::Redirect(_) => "redirect",
            DefinedCondition::RegistrationRequired => "registration-required",
            DefinedCondition::RemoteServerNotFound => "remote-server-not-found",
            DefinedCondition::RemoteServerTimeout => "remote-server-timeout",
            DefinedCondition::ResourceConstraint => "resource-constraint",
            DefinedCondition::ServiceUnavailable => "service-unavailable",
            DefinedCondition::SubscriptionRequired => "subscription-required",
            DefinedCondition::UndefinedCondition => "undefined-condition",
            DefinedCondition::UnexpectedRequest => "unexpected-request",
        }
    }

    /// Parse a condition from its element local name and, for `gone` and
    /// `redirect`, the element's text content.
    pub fn parse(local_name: &str, text: Option<String>) -> Result<Self, Error> {
        Ok(match local_name {
            "bad-request" => DefinedCondition::BadRequest,
            "conflict" => DefinedCondition::Conflict,
            "feature-not-implemented" => DefinedCondition::FeatureNotImplemented,
            "forbidden" => DefinedCondition::Forbidden,
            "gone" => DefinedCondition::Gone(text),
            "internal-server-error" => DefinedCondition::InternalServerError,
            "item-not-found" => DefinedCondition::ItemNotFound,
            "jid-malformed" => DefinedCondition::JidMalformed,
            "not-acceptable" => DefinedCondition::NotAcceptable,
            "not-allowed" => DefinedCondition::NotAllowed,
            "not-authorized" => DefinedCondition::NotAuthorized,
            "policy-violation" => DefinedCondition::PolicyViolation,
            "recipient-unavailable" => DefinedCondition::RecipientUnavailable,
            "redirect" => DefinedCondition::Redirect(text),
            "registration-required" => DefinedCondition::RegistrationRequired,
            "remote-server-not-found" => DefinedCondition::RemoteServerNotFound,
            "remote-server-timeout" => DefinedCondition::RemoteServerTimeout,
            "resource-constraint" => DefinedCondition::ResourceConstraint,
            "service-unavailable" => DefinedCondition::ServiceUnavailable,
            "subscription-required" => DefinedCondition::SubscriptionRequired,
            "undefined-condition" => DefinedCondition::UndefinedCondition,
            "unexpected-request" => DefinedCondition::UnexpectedRequest,
            other => {
                return Err(Error::InvalidAttribute(
                    "condition",
                    other.to_string(),
                ))
            }
        })
    }
}

/// A structured `<error/>` child of a stanza, per RFC 6120 §8.3.
///
/// Every field is optional so a `StanzaError` can double as a comparison
/// pattern: [`StanzaError::is`] treats `None` fields on the pattern as
/// wildcards, per the "partial match" comparison the protocol relies on
/// (e.g. matching any `service-unavailable` regardless of `by` or text).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StanzaError {
    /// The entity that generated the error, if present.
    pub by: Option<Jid>,
    /// The `type` attribute.
    pub type_: Option<ErrorType>,
    /// The defined condition child.
    pub condition: Option<DefinedCondition>,
    /// `xml:lang` → human-readable text, from `<text/>` children.
    pub text: BTreeMap<String, String>,
}

impl StanzaError {
    /// Construct a pattern that matches any error with the given condition,
    /// for use with [`StanzaError::is`].
    pub fn with_condition(condition: DefinedCondition) -> Self {
        StanzaError {
            condition: Some(condition),
            ..Default::default()
        }
    }

    /// True if every non-`None`/non-empty field of `pattern` equals the
    /// corresponding field of `self`.
    pub fn is(&self, pattern: &StanzaError) -> bool {
        if let Some(by) = &pattern.by {
            if self.by.as_ref() != Some(by) {
                return false;
            }
        }
        if let Some(type_) = &pattern.type_ {
            if self.type_.as_ref() != Some(type_) {
                return false;
            }
        }
        if let Some(condition) = &pattern.condition {
            if self.condition.as_ref() != Some(condition) {
                return false;
            }
        }
        for (lang, text) in &pattern.text {
            if self.text.get(lang) != Some(text) {
                return false;
            }
        }
        true
    }

    /// Decode a `StanzaError` from the children of an already-consumed
    /// `<error/>` start-element.
    pub fn parse<R: TokenReader>(
        type_: Option<&str>,
        by: Option<&str>,
        mut children: Iter<R>,
    ) -> Result<Self, Error> {
        let type_ = type_.map(ErrorType::parse).transpose()?;
        let by = by.map(Jid::new).transpose()?;
        let mut condition = None;
        let mut text = BTreeMap::new();

        while let Some(start) = children.next_child()? {
            let local = start.name.to_string();
            let lang = start
                .attrs
                .get(rxml::Namespace::from(ns::XML), "lang")
                .map(|s| s.to_string());
            let mut content = String::new();
            while let Some(token) = children.child_token()? {
                if let Token::Text(t) = token {
                    content.push_str(&t);
                }
            }
            if &*start.ns == ns::STANZAS {
                if local == "text" {
                    text.insert(lang.unwrap_or_default(), content);
                } else {
                    let payload = if content.is_empty() { None } else { Some(content) };
                    condition = Some(DefinedCondition::parse(&local, payload)?);
                }
            }
        }

        Ok(StanzaError {
            by,
            type_,
            condition,
            text,
        })
    }

    /// Build the token stream for this error's `<error/>` element,
    /// including the defined-condition child and any `<text/>` children.
    pub fn to_reader(&self) -> Box<dyn TokenReader> {
        let mut start = StartElement::new(
            rxml::Namespace::NONE,
            rxml::NcName::try_from("error").unwrap(),
        );
        if let Some(type_) = self.type_ {
            start = start.with_attr(
                rxml::Namespace::NONE,
                rxml::NcName::try_from("type").unwrap(),
                type_.as_str(),
            );
        }
        if let Some(by) = &self.by {
            start = start.with_attr(
                rxml::Namespace::NONE,
                rxml::NcName::try_from("by").unwrap(),
                by.to_string(),
            );
        }

        let mut children: Vec<Box<dyn TokenReader>> = Vec::new();
        if let Some(condition) = &self.condition {
            let cond_start = StartElement::new(
                rxml::Namespace::from(ns::STANZAS),
                rxml::NcName::try_from(condition.local_name()).unwrap(),
            );
            let payload = match condition {
                DefinedCondition::Gone(Some(addr)) | DefinedCondition::Redirect(Some(addr)) => {
                    Box::new(single(Token::Text(addr.clone()))) as Box<dyn TokenReader>
                }
                _ => Box::new(xmlstream::multi_reader(vec![])) as Box<dyn TokenReader>,
            };
            children.push(Box::new(wrap(payload, cond_start)));
        }
        for (lang, text) in &self.text {
            let mut text_start = StartElement::new(
                rxml::Namespace::from(ns::STANZAS),
                rxml::NcName::try_from("text").unwrap(),
            );
            if !lang.is_empty() {
                text_start = text_start.with_attr(
                    rxml::Namespace::from(ns::XML),
                    rxml::NcName::try_from("lang").unwrap(),
                    lang.clone(),
                );
            }
            children.push(Box::new(wrap(
                single(Token::Text(text.clone())),
                text_start,
            )));
        }

        Box::new(wrap(xmlstream::multi_reader(children), start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_matches_partial_pattern() {
        let err = StanzaError {
            by: Some(Jid::new("peer@example.com").unwrap()),
            type_: Some(ErrorType::Cancel),
            condition: Some(DefinedCondition::ServiceUnavailable),
            text: BTreeMap::new(),
        };
        let pattern = StanzaError::with_condition(DefinedCondition::ServiceUnavailable);
        assert!(err.is(&pattern));

        let wrong = StanzaError::with_condition(DefinedCondition::NotAuthorized);
        assert!(!err.is(&wrong));
    }

    #[test]
    fn condition_round_trips_local_name() {
        assert_eq!(
            DefinedCondition::parse("not-authorized", None).unwrap(),
            DefinedCondition::NotAuthorized
        );
        assert_eq!(
            DefinedCondition::NotAuthorized.local_name(),
            "not-authorized"
        );
    }
}
