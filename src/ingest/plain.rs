//! Fallback parser for files without a language extractor.

use super::{ParseOutput, Parser, SourceFile};
use crate::error::Result;

/// Records the file and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFileParser;

impl Parser for PlainFileParser {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn parse(&self, file: &SourceFile) -> Result<ParseOutput> {
        Ok(ParseOutput::for_file(&file.rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;
    use std::path::Path;

    #[test]
    fn test_plain_contribution() {
        let file = SourceFile::new(Path::new("/project"), "docs/README.md");
        let output = PlainFileParser.parse(&file).unwrap();

        assert_eq!(output.nodes.len(), 1);
        assert_eq!(output.nodes[0].node_type(), NodeType::File);
        assert_eq!(output.nodes[0].owner.as_deref(), Some("docs/README.md"));
        assert!(output.relationships.is_empty());
        assert_eq!(output.content.extension, "md");
        assert!(output.content.elements.is_empty());
    }
}
