// Documents as the rest of the pipeline sees them.
// Nothing here knows about Google's JSON; the infra client converts the API
// response into `StructuralElement`s and `flatten_text` turns those into plain text.

/// A listing entry returned by the document source (one page holds many).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListing {
    pub id: String,
    pub title: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<DocumentListing>,
    /// Opaque continuation token; `None` means this was the last page.
    pub next_page_token: Option<String>,
}

/// The structured body of a fetched document.
///
/// Tables and the table of contents hold nested structural elements, and
/// tables may themselves contain tables.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralElement {
    /// Text runs of a paragraph, in order. Non-text elements (images, page breaks) are dropped.
    Paragraph(Vec<String>),
    /// Rows of cells; each cell is its own list of structural elements.
    Table(Vec<Vec<Vec<StructuralElement>>>),
    TableOfContents(Vec<StructuralElement>),
    /// Section breaks and anything else without text.
    Other,
}

/// A document as returned by the source, before flattening.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    pub title: String,
    pub body: Vec<StructuralElement>,
}

/// Per-document metadata carried into every chunk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub title: String,
}

/// A document ready for chunking: plain text plus identity.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Document {
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            document_id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

impl From<SourceDocument> for Document {
    fn from(source: SourceDocument) -> Self {
        let text = flatten_text(&source.body);
        Self {
            id: source.id,
            title: source.title,
            text,
        }
    }
}

/// Concatenates all text in document order, descending into table cells
/// (row by row, cell by cell) and the table of contents.
pub fn flatten_text(elements: &[StructuralElement]) -> String {
    let mut output = String::new();
    push_elements(elements, &mut output);
    output
}

fn push_elements(elements: &[StructuralElement], output: &mut String) {
    for element in elements {
        match element {
            StructuralElement::Paragraph(runs) => {
                for run in runs {
                    output.push_str(run);
                }
            }
            StructuralElement::Table(rows) => {
                for cell in rows.iter().flatten() {
                    push_elements(cell, output);
                }
            }
            StructuralElement::TableOfContents(content) => push_elements(content, output),
            StructuralElement::Other => {}
        }
    }
}
