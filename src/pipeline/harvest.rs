use crate::diagram::{ShapeRef, VisioDocument};
use crate::utils::count_words;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedText {
    pub shape: ShapeRef,
    pub text: String,
    pub words: usize,
}

/// Translatable text of a document, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub items: Vec<HarvestedText>,
    pub total_words: usize,
}

impl Harvest {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Collects every shape with non-empty text, pages in document order and
/// shapes in page order.
pub fn harvest(document: &VisioDocument) -> Harvest {
    let mut harvest = Harvest::default();

    for shape in document.shape_refs() {
        let Some(text) = document.shape_text(shape) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let words = count_words(&text);
        harvest.total_words += words;
        harvest.items.push(HarvestedText { shape, text, words });
    }

    harvest
}
