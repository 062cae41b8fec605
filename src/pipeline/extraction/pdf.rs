use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};

use super::types::PdfTextLayer;
use super::NormalizeError;

/// PDF text layer reader using lopdf.
/// Reads the text-showing operators of each page's content stream and decodes
/// them through the selected font's encoding or ToUnicode map; scanned pages
/// without a text layer yield no items.
pub struct LopdfTextLayer;

impl PdfTextLayer for LopdfTextLayer {
    fn page_items(&self, pdf_bytes: &[u8]) -> Result<Vec<Vec<String>>, NormalizeError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| NormalizeError::CorruptOrUnreadable(format!("PDF parsing failed: {e}")))?;

        // BTreeMap keyed by page number: iteration is document order
        doc.get_pages()
            .into_iter()
            .map(|(page_number, page_id)| {
                let fonts = page_fonts(&doc, page_id).map_err(|e| {
                    NormalizeError::CorruptOrUnreadable(format!(
                        "PDF page {page_number} fonts unreadable: {e}"
                    ))
                })?;
                let raw = doc.get_page_content(page_id).map_err(|e| {
                    NormalizeError::CorruptOrUnreadable(format!(
                        "PDF page {page_number} content unreadable: {e}"
                    ))
                })?;
                let content = Content::decode(&raw).map_err(|e| {
                    NormalizeError::CorruptOrUnreadable(format!(
                        "PDF page {page_number} content stream invalid: {e}"
                    ))
                })?;
                Ok(text_items(&content, &fonts))
            })
            .collect()
    }
}

/// How the strings shown with one font resource turn into text.
enum FontText<'a> {
    Encoded(Encoding<'a>),
    /// Composite font without a usable ToUnicode map: its codes are glyph ids.
    Opaque,
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> lopdf::Result<BTreeMap<Vec<u8>, FontText<'_>>> {
    let fonts = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .filter(|(_, font)| font.type_is(b"Font"))
        .map(|(name, font)| {
            let text = match font.get_font_encoding(doc) {
                Ok(encoding) => FontText::Encoded(encoding),
                Err(e) => {
                    tracing::debug!(
                        font = %String::from_utf8_lossy(&name),
                        "Font has no usable text mapping: {e}"
                    );
                    FontText::Opaque
                }
            };
            (name, text)
        })
        .collect();
    Ok(fonts)
}

fn text_items(content: &Content, fonts: &BTreeMap<Vec<u8>, FontText<'_>>) -> Vec<String> {
    let mut font = None;
    let mut items = Vec::new();

    for op in &content.operations {
        let item = match op.operator.as_str() {
            "Tf" => {
                font = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| fonts.get(name));
                None
            }
            // Tj, ' and " all end with the string to show
            "Tj" | "'" | "\"" => op.operands.last().and_then(|s| shown_text(s, font)),
            "TJ" => match op.operands.first() {
                Some(Object::Array(parts)) => Some(
                    parts
                        .iter()
                        .filter_map(|part| shown_text(part, font))
                        .collect::<String>(),
                ),
                _ => None,
            },
            _ => None,
        };
        if let Some(item) = item.filter(|item| !item.trim().is_empty()) {
            items.push(item);
        }
    }
    items
}

fn shown_text(object: &Object, font: Option<&FontText<'_>>) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    match font {
        Some(FontText::Encoded(encoding)) => Some(
            Document::decode_text(encoding, bytes).unwrap_or_else(|_| decode_pdf_string(bytes)),
        ),
        Some(FontText::Opaque) => None,
        // No font selected, or one the page resources do not declare
        None => Some(decode_pdf_string(bytes)),
    }
}

/// UTF-16BE when the string carries a byte-order mark, Latin-1 otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Build a PDF whose pages show the given items, one `Tj` per item, in a
/// WinAnsi-encoded Helvetica.
#[cfg(test)]
pub(crate) fn make_test_pdf(pages: &[&[&str]]) -> Vec<u8> {
    use lopdf::dictionary;

    let contents = pages
        .iter()
        .map(|items| {
            let shown: String = items.iter().map(|item| format!("({item}) Tj ")).collect();
            format!("BT /F1 12 Tf 100 700 Td {shown}ET").into_bytes()
        })
        .collect();
    build_test_pdf(
        |doc| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })
        },
        contents,
    )
}

/// Build a PDF with one page per content stream, all sharing font `/F1`.
#[cfg(test)]
fn build_test_pdf(add_font: impl FnOnce(&mut Document) -> ObjectId, contents: Vec<Vec<u8>>) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::Stream;

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = add_font(&mut doc);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use crate::pipeline::extraction::types::join_page_items;

    #[test]
    fn reads_items_per_page_in_order() {
        let pdf = make_test_pdf(&[&["Hello", "World"], &["Foo"]]);
        let pages = LopdfTextLayer.page_items(&pdf).unwrap();
        assert_eq!(pages, vec![vec!["Hello", "World"], vec!["Foo"]]);
        assert_eq!(join_page_items(&pages), "Hello World\nFoo\n");
    }

    #[test]
    fn page_without_text_has_no_items() {
        let pdf = make_test_pdf(&[&[]]);
        let pages = LopdfTextLayer.page_items(&pdf).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let err = LopdfTextLayer
            .page_items(b"%PDF-1.4 this is not really a pdf")
            .unwrap_err();
        assert!(matches!(err, NormalizeError::CorruptOrUnreadable(_)));
    }

    #[test]
    fn tj_array_concatenates_strings() {
        let content = Content::decode(b"BT [(Hemo) -20 (globin)] TJ ET").unwrap();
        assert_eq!(text_items(&content, &BTreeMap::new()), vec!["Hemoglobin"]);
    }

    #[test]
    fn utf16_strings_decoded() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9]), "Hé");
        assert_eq!(decode_pdf_string(&[0x48, 0xE9]), "Hé");
    }

    const TO_UNICODE_CMAP: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0048>
<0004> <0062>
endbfchar
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

    fn identity_font(doc: &mut Document, to_unicode: Option<&str>) -> ObjectId {
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "Arial",
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
        });
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Arial",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![descendant.into()],
        };
        if let Some(cmap) = to_unicode {
            let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.as_bytes().to_vec()));
            font.set("ToUnicode", cmap_id);
        }
        doc.add_object(font)
    }

    #[test]
    fn win_ansi_punctuation_decoded() {
        let content = b"BT /F1 12 Tf 100 700 Td (Range 13\x9617 \x93ok\x94) Tj ET".to_vec();
        let pdf = build_test_pdf(
            |doc| {
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                })
            },
            vec![content],
        );
        let pages = LopdfTextLayer.page_items(&pdf).unwrap();
        assert_eq!(pages, vec![vec!["Range 13\u{2013}17 \u{201C}ok\u{201D}"]]);
    }

    #[test]
    fn identity_font_decoded_through_to_unicode_map() {
        let content = b"BT /F1 12 Tf 100 700 Td <00030004> Tj ET".to_vec();
        let pdf = build_test_pdf(|doc| identity_font(doc, Some(TO_UNICODE_CMAP)), vec![content]);
        let pages = LopdfTextLayer.page_items(&pdf).unwrap();
        assert_eq!(pages, vec![vec!["Hb"]]);
    }

    #[test]
    fn identity_font_without_map_yields_no_text() {
        let content = b"BT /F1 12 Tf 100 700 Td <00030004> Tj ET".to_vec();
        let pdf = build_test_pdf(|doc| identity_font(doc, None), vec![content]);
        let pages = LopdfTextLayer.page_items(&pdf).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty(), "glyph ids must not pass as text: {pages:?}");
    }

    #[test]
    fn undeclared_font_falls_back_to_latin1() {
        let content = Content::decode(b"BT /F9 12 Tf (H\xe9) Tj ET").unwrap();
        assert_eq!(text_items(&content, &BTreeMap::new()), vec!["H\u{e9}"]);
    }
}
