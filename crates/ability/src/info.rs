use strum::Display;

/// How an ability may be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AbilityType {
    /// Directly runnable by the framework user.
    #[strum(serialize = "Standalone")]
    Standalone,
    /// Only callable from another ability.
    #[strum(serialize = "Component")]
    Component,
}

/// Advertised maturity of an ability implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Reliability {
    /// Code in construction.
    #[strum(serialize = "Not working")]
    NotWorking,
    /// Worked at least once.
    #[strum(serialize = "Unstable")]
    Unstable,
    /// Challenged by several tests.
    #[strum(serialize = "Tested")]
    Tested,
    /// Tested across several environments.
    #[strum(serialize = "Reliable")]
    Reliable,
    /// Advertised functionality not fully implemented.
    #[strum(serialize = "Incomplete")]
    Incomplete,
}

/// Categorization tags for ability listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Tag {
    /// Performs intrusive network actions.
    #[strum(serialize = "Intrusive")]
    Intrusive,
    /// Performs network scans.
    #[strum(serialize = "Scan")]
    Scan,
    /// Demonstrates a framework functionality.
    #[strum(serialize = "Example")]
    Example,
    /// Generates no traffic.
    #[strum(serialize = "Offline")]
    Offline,
    /// Works at the physical layer.
    #[strum(serialize = "Physical_Layer")]
    PhysicalLayer,
    /// Works at the data-link layer.
    #[strum(serialize = "Data Link_Layer")]
    DataLinkLayer,
    /// Works at the network layer.
    #[strum(serialize = "Network_Layer")]
    NetworkLayer,
    /// Works at the transport layer.
    #[strum(serialize = "Transport_Layer")]
    TransportLayer,
    /// Works at the application layer.
    #[strum(serialize = "Application_Layer")]
    ApplicationLayer,
    /// Addresses industrial control systems.
    #[strum(serialize = "ICS")]
    Ics,
    /// DNS related.
    #[strum(serialize = "DNS")]
    Dns,
}

/// Immutable metadata describing an ability.
#[derive(Debug, Clone)]
pub struct AbilityInfo {
    name: String,
    description: String,
    authors: Vec<String>,
    references: Vec<String>,
    diffusion: String,
    tags: Vec<Tag>,
    reliability: Reliability,
    kind: AbilityType,
}

impl AbilityInfo {
    /// Creates metadata with the given unique name; every other field starts
    /// from its neutral value.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            authors: Vec::new(),
            references: Vec::new(),
            diffusion: String::new(),
            tags: Vec::new(),
            reliability: Reliability::Incomplete,
            kind: AbilityType::Standalone,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Sets the author list.
    pub fn with_authors(mut self, authors: &[&str]) -> Self {
        self.authors = authors.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Sets the reference list (free-form `description|date|link` strings).
    pub fn with_references(mut self, references: &[&str]) -> Self {
        self.references = references.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Sets the diffusion marker.
    pub fn with_diffusion(mut self, diffusion: &str) -> Self {
        self.diffusion = diffusion.to_string();
        self
    }

    /// Sets the categorization tags.
    pub fn with_tags(mut self, tags: &[Tag]) -> Self {
        self.tags = tags.to_vec();
        self
    }

    /// Sets the reliability level.
    pub fn with_reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    /// Sets the ability type.
    pub fn with_kind(mut self, kind: AbilityType) -> Self {
        self.kind = kind;
        self
    }

    /// The ability name, unique within its package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ability description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The categorization tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// STANDALONE or COMPONENT.
    pub fn kind(&self) -> AbilityType {
        self.kind
    }

    /// Key/value rendering of the fields that were set, for listings.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let mut items = vec![
            ("name", self.name.clone()),
            ("type", self.kind.to_string()),
        ];
        if !self.description.is_empty() {
            items.push(("description", self.description.clone()));
        }
        if !self.authors.is_empty() {
            items.push(("authors", self.authors.join(", ")));
        }
        if !self.references.is_empty() {
            items.push(("references", self.references.join("\n- ")));
        }
        if !self.diffusion.is_empty() {
            items.push(("diffusion", self.diffusion.clone()));
        }
        if !self.tags.is_empty() {
            items.push((
                "tags",
                self.tags
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }
        items.push(("reliability", self.reliability.to_string()));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_skips_unset_fields() {
        let info = AbilityInfo::new("Demux").with_kind(AbilityType::Component);
        let keys: Vec<&str> = info.summary().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["name", "type", "reliability"]);
    }

    #[test]
    fn summary_renders_tags() {
        let info = AbilityInfo::new("Sniff Frames")
            .with_tags(&[Tag::PhysicalLayer, Tag::Intrusive])
            .with_authors(&["jdoe"]);
        let summary = info.summary();
        let tags = summary.iter().find(|(k, _)| *k == "tags").unwrap();
        assert_eq!(tags.1, "Physical_Layer, Intrusive");
    }
}
