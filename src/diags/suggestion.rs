//! Fuzzy-match support for "did you mean" diagnostics.

/// Levenshtein edit distance between two strings, by characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// The farthest apart two names can be while still producing a suggestion.
pub const DISTANCE_LIMIT: usize = 3;

/// Picks the closest candidate within [`DISTANCE_LIMIT`], comparing
/// case-insensitively so that a pure casing mistake is always the best match.
pub fn closest<'a, I>(name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let folded = name.to_lowercase();
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let d = edit_distance(&folded, &candidate.to_lowercase());
        if d > DISTANCE_LIMIT {
            continue;
        }
        match best {
            Some((bd, _)) if bd <= d => {}
            _ => best = Some((d, candidate)),
        }
    }
    best.map(|(_, c)| c)
}

/// Formats "does not exist" messages for a field that was looked up against a
/// closed set, listing what does exist (capped, with a remainder count).
pub struct ExistingFieldFormatter {
    pub parent_label: String,
    pub fields: Vec<String>,
    pub max_elements: usize,
    pub fields_are_properties: bool,
}

impl ExistingFieldFormatter {
    pub fn new(parent_label: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            parent_label: parent_label.into(),
            fields,
            max_elements: 5,
            fields_are_properties: false,
        }
    }

    pub fn properties(mut self) -> Self {
        self.fields_are_properties = true;
        self.fields.sort();
        self
    }

    /// `(summary, detail)` for a field that does not exist. `label` names the
    /// missing field as it should read in the summary.
    pub fn message_with_detail(&self, label: &str) -> (String, String) {
        let summary = format!("{} does not exist on {}", label, self.parent_label);
        (summary, self.existing_list())
    }

    fn existing_list(&self) -> String {
        let noun = if self.fields_are_properties {
            "properties"
        } else {
            "fields"
        };
        if self.fields.is_empty() {
            return format!("{} has no {}", self.parent_label, noun);
        }
        let shown = self.fields.len().min(self.max_elements);
        let mut list = self.fields[..shown].join(", ");
        if self.fields.len() > shown {
            list.push_str(&format!(", and {} others", self.fields.len() - shown));
        }
        format!(
            "Existing {} are: {}",
            noun, list
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "four"), 4);
    }

    #[test]
    fn closest_respects_limit() {
        let fields = ["properties", "options", "type"];
        assert_eq!(closest("Propertys", fields), Some("properties"));
        assert_eq!(closest("zzzzzzz", fields), None);
    }

    #[test]
    fn casing_mistake_is_distance_zero() {
        let fields = ["dependsOn", "parent"];
        assert_eq!(closest("dependson", fields), Some("dependsOn"));
    }

    #[test]
    fn existing_list_caps_at_max() {
        let fmtr = ExistingFieldFormatter::new(
            "Invoke test:fn",
            vec!["yesArg".into(), "someSuchArg".into()],
        );
        let (summary, detail) = fmtr.message_with_detail("noArg");
        assert_eq!(summary, "noArg does not exist on Invoke test:fn");
        assert_eq!(detail, "Existing fields are: yesArg, someSuchArg");

        let fmtr = ExistingFieldFormatter::new(
            "'pkg:mod:Big'",
            (0..8).map(|i| format!("p{}", i)).collect(),
        )
        .properties();
        let (_, detail) = fmtr.message_with_detail("nope");
        assert_eq!(
            detail,
            "Existing properties are: p0, p1, p2, p3, p4, and 3 others"
        );
    }

    #[test]
    fn properties_are_sorted() {
        let fmtr =
            ExistingFieldFormatter::new("x", vec!["foo".into(), "bar".into()]).properties();
        let (_, detail) = fmtr.message_with_detail("nope");
        assert_eq!(detail, "Existing properties are: bar, foo");
    }
}
