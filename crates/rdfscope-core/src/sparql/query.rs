//! SPARQL query text builders
//!
//! Pure functions; every IRI passes through [`wrap_iri`] before it is spliced
//! into a query.

/// Row cap for incoming relation queries
pub const INCOMING_RELATIONS_LIMIT: usize = 500;

/// Row cap for transitive ancestry queries
pub const ANCESTRY_LIMIT: usize = 500;

/// Row cap for batched label and object lookups
pub const BATCH_LIMIT: usize = 10_000;

/// Wrap an IRI in angle brackets, percent-encoding characters that may not
/// appear inside an IRIREF
pub fn wrap_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len() + 2);
    out.push('<');
    for c in iri.chars() {
        match c {
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' => {
                out.push_str(&format!("%{:02X}", c as u32));
            }
            c if c.is_whitespace() || c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
            c => out.push(c),
        }
    }
    out.push('>');
    out
}

/// `<a>|<b>|...` alternation path
fn alternation<S: AsRef<str>>(iris: &[S]) -> String {
    iris.iter()
        .map(|iri| wrap_iri(iri.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

/// All predicate/object pairs of `id`
pub fn describe_node(id: &str) -> String {
    format!(
        "SELECT DISTINCT ?pred ?obj WHERE {{\n  {} ?pred ?obj .\n}}",
        wrap_iri(id)
    )
}

/// Subjects pointing at `id`, with the predicate they use
pub fn incoming_relations(id: &str) -> String {
    format!(
        "SELECT DISTINCT ?sub ?pred WHERE {{\n  ?sub ?pred {} .\n}}\nLIMIT {}",
        wrap_iri(id),
        INCOMING_RELATIONS_LIMIT
    )
}

/// Transitive closure over the parent predicates starting at `id`, with the
/// label and direct parent of every ancestor when available
pub fn ancestry<S: AsRef<str>>(id: &str, parents: &[S], labels: &[S]) -> String {
    let closure = parents
        .iter()
        .map(|iri| format!("{}*", wrap_iri(iri.as_ref())))
        .collect::<Vec<_>>()
        .join("|");

    // no label predicates means no title column, not an empty path
    let title = if labels.is_empty() {
        String::new()
    } else {
        format!("\n  OPTIONAL {{ ?id {} ?title . }}", alternation(labels))
    };

    format!(
        "SELECT DISTINCT ?id ?title ?parent WHERE {{\n  {} {} ?id .{}\n  OPTIONAL {{ ?id {} ?parent . }}\n}}\nLIMIT {}",
        wrap_iri(id),
        closure,
        title,
        alternation(parents),
        ANCESTRY_LIMIT
    )
}

/// Labels for every id in one `VALUES` batch
pub fn labels<S: AsRef<str>, L: AsRef<str>>(ids: &[S], labels: &[L]) -> String {
    let values = ids
        .iter()
        .map(|id| wrap_iri(id.as_ref()))
        .collect::<Vec<_>>()
        .join("\n    ");

    format!(
        "SELECT DISTINCT ?s ?label WHERE {{\n  VALUES ?s {{\n    {}\n  }}\n  ?s {} ?label .\n}}\nLIMIT {}",
        values,
        alternation(labels),
        BATCH_LIMIT
    )
}

/// Objects of `id` across any of `predicates`
pub fn object_ids<S: AsRef<str>>(id: &str, predicates: &[S]) -> String {
    format!(
        "SELECT DISTINCT ?o WHERE {{\n  {} {} ?o .\n}}\nLIMIT {}",
        wrap_iri(id),
        alternation(predicates),
        BATCH_LIMIT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBCLASS: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    const BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
    const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

    #[test]
    fn test_wrap_iri() {
        assert_eq!(wrap_iri("http://example.org/a"), "<http://example.org/a>");
        assert_eq!(
            wrap_iri("http://example.org/a b>"),
            "<http://example.org/a%20b%3E>"
        );
        assert_eq!(wrap_iri("x{y}"), "<x%7By%7D>");
    }

    #[test]
    fn test_describe_node() {
        let q = describe_node("http://example.org/a");
        assert!(q.starts_with("SELECT DISTINCT ?pred ?obj WHERE"));
        assert!(q.contains("<http://example.org/a> ?pred ?obj ."));
    }

    #[test]
    fn test_incoming_relations_is_capped() {
        let q = incoming_relations("http://example.org/a");
        assert!(q.contains("?sub ?pred <http://example.org/a> ."));
        assert!(q.ends_with("LIMIT 500"));
    }

    #[test]
    fn test_ancestry_paths() {
        let q = ancestry("http://example.org/a", &[SUBCLASS, BROADER], &[LABEL]);
        assert!(q.contains(&format!(
            "<http://example.org/a> <{}>*|<{}>* ?id .",
            SUBCLASS, BROADER
        )));
        assert!(q.contains(&format!("OPTIONAL {{ ?id <{}> ?title . }}", LABEL)));
        assert!(q.contains(&format!(
            "OPTIONAL {{ ?id <{}>|<{}> ?parent . }}",
            SUBCLASS, BROADER
        )));
        assert!(q.ends_with(&format!("LIMIT {}", ANCESTRY_LIMIT)));
    }

    #[test]
    fn test_ancestry_without_labels_has_no_title_clause() {
        let q = ancestry("http://example.org/a", &[SUBCLASS], &[]);
        assert!(!q.contains("?title ."));
        assert!(!q.contains("{ ?id  ?"));
        assert!(q.contains(&format!("OPTIONAL {{ ?id <{}> ?parent . }}", SUBCLASS)));
        assert!(q.starts_with("SELECT DISTINCT ?id ?title ?parent WHERE {"));
    }

    #[test]
    fn test_labels_batches_ids() {
        let q = labels(&["http://e/a", "http://e/b"], &[LABEL]);
        assert!(q.contains("VALUES ?s {"));
        assert!(q.contains("<http://e/a>\n    <http://e/b>"));
        assert!(q.contains(&format!("?s <{}> ?label .", LABEL)));
        assert!(q.ends_with("LIMIT 10000"));
    }

    #[test]
    fn test_object_ids() {
        let q = object_ids("http://e/a", &[SUBCLASS, BROADER]);
        assert!(q.contains(&format!("<http://e/a> <{}>|<{}> ?o .", SUBCLASS, BROADER)));
    }
}
