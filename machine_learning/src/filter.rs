use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A list of name fragments; a name matches when it contains any of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter(Vec<String>);

impl NameFilter {
    /// Parses a comma separated list, ignoring blanks around and between entries.
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fragments(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|fragment| name.contains(fragment.as_str()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameFilter {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawList {
    Joined(String),
    Items(Vec<String>),
}

impl<'de> Deserialize<'de> for NameFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawList::deserialize(deserializer)? {
            RawList::Joined(list) => Self::parse(&list),
            RawList::Items(items) => items.into_iter().collect(),
        })
    }
}

impl Serialize for NameFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Selects the variables the optimizer is allowed to update.
///
/// A name is trainable when no blacklist fragment matches it and, if the
/// whitelist is not empty, some whitelist fragment does. The blacklist always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainableFilter {
    whitelist: NameFilter,
    blacklist: NameFilter,
}

impl TrainableFilter {
    pub fn new(whitelist: NameFilter, blacklist: NameFilter) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        if self.blacklist.matches(name) {
            return false;
        }

        self.whitelist.is_empty() || self.whitelist.matches(name)
    }

    /// Filters `names` keeping the order.
    pub fn select<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter(|n| self.allows(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 4] = [
        "resnet/conv1/weights",
        "resnet/conv1/BatchNorm/gamma",
        "resnet/logits/weights",
        "resnet/logits/biases",
    ];

    #[test]
    fn parse_skips_blank_entries() {
        let filter = NameFilter::parse(" BatchNorm, ,preact,postnorm,");
        assert_eq!(filter.fragments(), ["BatchNorm", "preact", "postnorm"]);
    }

    #[test]
    fn empty_whitelist_allows_everything_not_blacklisted() {
        let filter = TrainableFilter::new(NameFilter::default(), NameFilter::parse("BatchNorm"));
        assert_eq!(
            filter.select(NAMES),
            vec![NAMES[0], NAMES[2], NAMES[3]]
        );
    }

    #[test]
    fn blacklist_wins_over_whitelist() {
        let filter = TrainableFilter::new(
            NameFilter::parse("logits"),
            NameFilter::parse("biases"),
        );
        assert_eq!(filter.select(NAMES), vec![NAMES[2]]);
    }

    #[test]
    fn deserializes_from_string_or_array() {
        let joined: NameFilter = serde_json::from_str(r#""a,b""#).unwrap();
        let items: NameFilter = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(joined, items);
    }
}
