//! Text lookup: the `MessageService` collaborator, an in-memory bundle
//! implementation, and the override resolver applied to model texts.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::types::ModelKey;

/// `{0}`, `{1}`, ... argument placeholders.
static RE_ARG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\d+)\}").unwrap());

// ---------------------------------------------------------------------------
// Message service
// ---------------------------------------------------------------------------

/// Message bundle lookup. Implementations never fail: a miss is `None`, or
/// a visible placeholder from [`MessageService::format`].
pub trait MessageService: Send + Sync {
    /// Look up `key` in the default locale.
    fn resolve(&self, key: &str) -> Option<String>;

    /// Look up `key` in `locale` only. No default-locale fallback: callers
    /// that want one try [`MessageService::resolve`] next.
    fn resolve_in(&self, key: &str, locale: &str) -> Option<String>;

    /// Look up and format `key`, substituting `{n}` with `args[n]`.
    fn format(&self, key: &str, locale: &str, args: &[&str]) -> String {
        match self.resolve_in(key, locale).or_else(|| self.resolve(key)) {
            Some(text) => substitute_args(&text, args),
            None => missing_message(key),
        }
    }
}

/// Placeholder returned for keys absent from every bundle.
pub fn missing_message(key: &str) -> String {
    format!("[missing message: {key}]")
}

fn substitute_args(text: &str, args: &[&str]) -> String {
    RE_ARG
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| args.get(idx))
                .map_or_else(|| caps[0].to_string(), |arg| arg.to_string())
        })
        .into_owned()
}

/// Service without any bundle; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMessages;

impl MessageService for NoMessages {
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }

    fn resolve_in(&self, _key: &str, _locale: &str) -> Option<String> {
        None
    }
}

/// In-memory bundles keyed by locale tag.
///
/// `resolve_in(key, "nl-BE")` tries `nl-BE`, then `nl`.
#[derive(Debug, Clone, Default)]
pub struct BundleMessageService {
    default_locale: String,
    bundles: HashMap<String, HashMap<String, String>>,
}

impl BundleMessageService {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            bundles: HashMap::new(),
        }
    }

    pub fn with_bundle<K, V>(mut self, locale: &str, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let bundle = self.bundles.entry(locale.to_string()).or_default();
        bundle.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn insert(&mut self, locale: &str, key: impl Into<String>, text: impl Into<String>) {
        self.bundles
            .entry(locale.to_string())
            .or_default()
            .insert(key.into(), text.into());
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<&String> {
        self.bundles.get(locale).and_then(|bundle| bundle.get(key))
    }
}

impl MessageService for BundleMessageService {
    fn resolve(&self, key: &str) -> Option<String> {
        self.lookup(key, &self.default_locale).cloned()
    }

    fn resolve_in(&self, key: &str, locale: &str) -> Option<String> {
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        self.lookup(key, locale)
            .or_else(|| self.lookup(key, language))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Text override resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProperty {
    DisplayName,
    DisplayNamePlural,
    Description,
    Prompt,
}

impl TextProperty {
    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::DisplayName => "displayName",
            Self::DisplayNamePlural => "displayNamePlural",
            Self::Description => "description",
            Self::Prompt => "prompt",
        }
    }
}

/// Applies message bundle overrides to model texts.
///
/// Keys follow `<reference>.<attribute>.<property>` for attributes and
/// `<reference>.<property>` for entities. A nested reference such as
/// `Customer.region` falls back to the class-level key (`Region.name...`).
/// The requested locale outranks the key: every key is tried in that
/// locale before any is tried in the default locale.
#[derive(Clone)]
pub struct TextOverrideResolver {
    messages: Arc<dyn MessageService>,
}

impl TextOverrideResolver {
    pub fn new(messages: Arc<dyn MessageService>) -> Self {
        Self { messages }
    }

    pub fn none() -> Self {
        Self::new(Arc::new(NoMessages))
    }

    pub fn entity_text(
        &self,
        key: &ModelKey,
        property: TextProperty,
        locale: Option<&str>,
    ) -> Option<String> {
        let suffix = property.key_suffix();
        self.first_match(
            [
                Some(format!("{}.{suffix}", key.reference)),
                (key.reference != key.class).then(|| format!("{}.{suffix}", key.class)),
            ],
            locale,
        )
    }

    pub fn attribute_text(
        &self,
        key: &ModelKey,
        attribute: &str,
        property: TextProperty,
        locale: Option<&str>,
    ) -> Option<String> {
        let suffix = property.key_suffix();
        self.first_match(
            [
                Some(format!("{}.{attribute}.{suffix}", key.reference)),
                (key.reference != key.class)
                    .then(|| format!("{}.{attribute}.{suffix}", key.class)),
            ],
            locale,
        )
    }

    fn first_match(&self, candidates: [Option<String>; 2], locale: Option<&str>) -> Option<String> {
        let keys: Vec<String> = candidates.into_iter().flatten().collect();
        locale
            .and_then(|locale| keys.iter().find_map(|key| self.messages.resolve_in(key, locale)))
            .or_else(|| keys.iter().find_map(|key| self.messages.resolve(key)))
    }
}

impl fmt::Debug for TextOverrideResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TextOverrideResolver")
    }
}

// ---------------------------------------------------------------------------
// Default texts
// ---------------------------------------------------------------------------

/// Derive a display name from an identifier or dotted path:
/// `address.streetName` → `Address street name`, `CustomerOrder` → `Customer order`.
pub fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for segment in name.split(['.', '_', '-', ' ']).filter(|s| !s.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for ch in segment.chars() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.push(ch);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }

    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let all_caps = word.chars().count() > 1 && word.chars().all(|c| !c.is_lowercase());
        if all_caps {
            out.push_str(word);
        } else if i == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        } else {
            out.push_str(&word.to_lowercase());
        }
    }
    out
}

/// Naive English plural of a display name.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.ends_with('y')
        && !["ay", "ey", "iy", "oy", "uy"].iter().any(|v| lower.ends_with(v))
    {
        format!("{}ies", &name[..name.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> BundleMessageService {
        BundleMessageService::new("en")
            .with_bundle("en", [("Customer.name.displayName", "Name"), ("greet", "Hello {0}, {1}")])
            .with_bundle("nl", [("Customer.name.displayName", "Naam")])
    }

    #[test]
    fn locale_fallback_chain() {
        let messages = bundle();
        assert_eq!(messages.resolve("Customer.name.displayName").as_deref(), Some("Name"));
        assert_eq!(
            messages.resolve_in("Customer.name.displayName", "nl-BE").as_deref(),
            Some("Naam")
        );
        assert_eq!(messages.resolve_in("Customer.name.displayName", "fr"), None);
        assert_eq!(messages.resolve_in("absent", "nl"), None);

        let resolver = TextOverrideResolver::new(Arc::new(messages));
        let customer = ModelKey::root("Customer");
        let name = |locale| resolver.attribute_text(&customer, "name", TextProperty::DisplayName, locale);
        assert_eq!(name(Some("fr")).as_deref(), Some("Name"));
        assert_eq!(name(Some("nl-BE")).as_deref(), Some("Naam"));
        assert_eq!(name(None).as_deref(), Some("Name"));
    }

    #[test]
    fn format_substitutes_and_never_fails() {
        let messages = bundle();
        assert_eq!(messages.format("greet", "en", &["Ada", "welcome"]), "Hello Ada, welcome");
        assert_eq!(messages.format("greet", "en", &["Ada"]), "Hello Ada, {1}");
        assert_eq!(messages.format("greet", "de", &["Ada", "hi"]), "Hello Ada, hi");
        assert_eq!(messages.format("absent.key", "en", &[]), "[missing message: absent.key]");
        assert_eq!(NoMessages.format("x", "en", &[]), "[missing message: x]");
    }

    #[test]
    fn nested_reference_falls_back_to_class_key() {
        let resolver = TextOverrideResolver::new(Arc::new(
            BundleMessageService::new("en").with_bundle("en", [("Region.name.displayName", "Region name")]),
        ));
        let nested = ModelKey::root("Customer").nested("region", "Region");
        assert_eq!(
            resolver
                .attribute_text(&nested, "name", TextProperty::DisplayName, None)
                .as_deref(),
            Some("Region name")
        );
        assert_eq!(
            resolver.attribute_text(&nested, "code", TextProperty::DisplayName, Some("en")),
            None
        );
    }

    #[test]
    fn requested_locale_beats_reference_key() {
        let resolver = TextOverrideResolver::new(Arc::new(
            BundleMessageService::new("en")
                .with_bundle("en", [("Customer.region.name.displayName", "Region of customer")])
                .with_bundle("nl", [("Region.name.displayName", "Regionaam")]),
        ));
        let nested = ModelKey::root("Customer").nested("region", "Region");
        let name = |locale| resolver.attribute_text(&nested, "name", TextProperty::DisplayName, locale);
        assert_eq!(name(Some("nl")).as_deref(), Some("Regionaam"));
        assert_eq!(name(Some("fr")).as_deref(), Some("Region of customer"));
        assert_eq!(name(None).as_deref(), Some("Region of customer"));
    }

    #[test]
    fn humanize_identifiers() {
        assert_eq!(humanize("name"), "Name");
        assert_eq!(humanize("createdAt"), "Created at");
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize("address.streetName"), "Address street name");
        assert_eq!(humanize("CustomerOrder"), "Customer order");
        assert_eq!(humanize("vatID"), "Vat ID");
    }

    #[test]
    fn pluralize_names() {
        assert_eq!(pluralize("Customer"), "Customers");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Address"), "Addresses");
    }
}
