//! Active sheet lookup and hyperlink extraction straight from the workbook
//! package.
//!
//! The cell reader only sees values, so the active tab is read from
//! `xl/workbook.xml` and hyperlinks of that sheet from its XML part, resolved
//! through the part's relationships.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::model::reference::parse_cell;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// A hyperlink anchored on one cell or a rectangular cell range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellHyperlink {
    pub first_row: u32,
    pub first_column: u32,
    pub last_row: u32,
    pub last_column: u32,
    /// External URL, or `#Sheet!A1` for links inside the workbook.
    pub target: String,
}

impl CellHyperlink {
    /// Cell positions the link covers, with ranges clipped to
    /// `max_row` × `max_column`. A single-cell link is never clipped.
    pub fn positions(&self, max_row: u32, max_column: u32) -> Vec<(u32, u32)> {
        if self.first_row == self.last_row && self.first_column == self.last_column {
            return vec![(self.first_row, self.first_column)];
        }
        let last_row = self.last_row.min(max_row);
        let last_column = self.last_column.min(max_column);
        (self.first_row..=last_row)
            .flat_map(|row| (self.first_column..=last_column).map(move |column| (row, column)))
            .collect()
    }
}

/// The worksheet a workbook opens on, with its hyperlinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSheet {
    /// Zero-based position among the workbook's `<sheet>` entries.
    pub index: usize,
    pub hyperlinks: Vec<CellHyperlink>,
}

/// Sheet entries and view settings of `xl/workbook.xml`.
#[derive(Debug, Default)]
struct WorkbookLayout {
    active_tab: usize,
    sheet_rel_ids: Vec<Option<String>>,
}

/// Locates the active worksheet of an `.xlsx` package and reads its
/// hyperlinks. Without an `activeTab` setting the first sheet is active.
pub fn read_active_sheet(bytes: &[u8]) -> Result<ActiveSheet> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| ReconcileError::InvalidWorkbook(format!("missing part '{WORKBOOK_PART}'")))?;
    let layout = parse_workbook(&workbook_xml)?;
    let index = if layout.active_tab < layout.sheet_rel_ids.len() {
        layout.active_tab
    } else {
        0
    };
    let mut active = ActiveSheet {
        index,
        hyperlinks: Vec::new(),
    };
    let Some(Some(rel_id)) = layout.sheet_rel_ids.get(index) else {
        return Ok(active);
    };

    let workbook_rels = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => return Ok(active),
    };
    let Some(sheet_target) = workbook_rels.get(rel_id) else {
        return Ok(active);
    };

    let sheet_part = resolve_part("xl", sheet_target);
    let Some(sheet_xml) = read_part(&mut archive, &sheet_part)? else {
        return Ok(active);
    };
    let sheet_rels = match read_part(&mut archive, &rels_part_for(&sheet_part))? {
        Some(xml) => parse_relationships(&xml)?,
        None => BTreeMap::new(),
    };

    active.hyperlinks = parse_hyperlinks(&sheet_xml, &sheet_rels)?;
    Ok(active)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn resolve_part(base_dir: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base_dir}/{target}"),
    }
}

fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn parse_workbook(workbook_xml: &str) -> Result<WorkbookLayout> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut layout = WorkbookLayout::default();
    let mut seen_view = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) => match e.local_name().as_ref() {
                b"sheet" => layout.sheet_rel_ids.push(attribute(&e, b"r:id")?),
                // Only the first view decides which tab opens.
                b"workbookView" if !seen_view => {
                    seen_view = true;
                    layout.active_tab = attribute(&e, b"activeTab")?
                        .and_then(|tab| tab.trim().parse().ok())
                        .unwrap_or(0);
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(layout)
}

/// Relationship id → target.
fn parse_relationships(rels_xml: &str) -> Result<BTreeMap<String, String>> {
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = BTreeMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                {
                    rels.insert(id, target);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn parse_hyperlinks(
    sheet_xml: &str,
    rels: &BTreeMap<String, String>,
) -> Result<Vec<CellHyperlink>> {
    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"hyperlink" => {
                out.extend(hyperlink_range(&e, rels)?);
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn hyperlink_range(
    element: &BytesStart<'_>,
    rels: &BTreeMap<String, String>,
) -> Result<Option<CellHyperlink>> {
    let Some(reference) = attribute(element, b"ref")? else {
        return Ok(None);
    };
    let Some(((first_row, first_column), (last_row, last_column))) = parse_range(&reference)
    else {
        return Ok(None);
    };
    let target = match (attribute(element, b"r:id")?, attribute(element, b"location")?) {
        (Some(rel_id), _) => rels.get(&rel_id).cloned(),
        (None, Some(location)) => Some(format!("#{location}")),
        (None, None) => None,
    };

    Ok(target.map(|target| CellHyperlink {
        first_row,
        first_column,
        last_row,
        last_column,
        target,
    }))
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// Parses `"B2"` or `"B2:C3"` into its top-left and bottom-right corners.
fn parse_range(reference: &str) -> Option<((u32, u32), (u32, u32))> {
    let (start, end) = match reference.split_once(':') {
        Some((start, end)) => (parse_cell(start)?, parse_cell(end)?),
        None => {
            let cell = parse_cell(reference)?;
            (cell, cell)
        }
    };
    Some((
        (start.0.min(end.0), start.1.min(end.1)),
        (start.0.max(end.0), start.1.max(end.1)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperlinks_resolve_through_relationships() {
        let rels = parse_relationships(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/a?x=1&amp;y=2" TargetMode="External"/>
            </Relationships>"#,
        )
        .expect("relationships parsed");

        let links = parse_hyperlinks(
            r#"<worksheet xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
                <sheetData/>
                <hyperlinks>
                    <hyperlink ref="B2" r:id="rId1"/>
                    <hyperlink ref="C3:C4" location="Other!A1"/>
                </hyperlinks>
            </worksheet>"#,
            &rels,
        )
        .expect("hyperlinks parsed");

        assert_eq!(
            links,
            vec![
                CellHyperlink {
                    first_row: 2,
                    first_column: 2,
                    last_row: 2,
                    last_column: 2,
                    target: "https://example.com/a?x=1&y=2".into()
                },
                CellHyperlink {
                    first_row: 3,
                    first_column: 3,
                    last_row: 4,
                    last_column: 3,
                    target: "#Other!A1".into()
                },
            ]
        );
        assert_eq!(links[1].positions(10, 10), vec![(3, 3), (4, 3)]);
    }

    #[test]
    fn whole_sheet_range_is_clipped_to_populated_area() {
        let links = parse_hyperlinks(
            r#"<worksheet><hyperlinks><hyperlink ref="A1:XFD1048576" location="Index!A1"/></hyperlinks></worksheet>"#,
            &BTreeMap::new(),
        )
        .expect("hyperlinks parsed");

        assert_eq!(links.len(), 1);
        assert_eq!((links[0].last_row, links[0].last_column), (1_048_576, 16_384));
        assert_eq!(
            links[0].positions(2, 2),
            vec![(1, 1), (1, 2), (2, 1), (2, 2)]
        );
        assert!(links[0].positions(0, 0).is_empty());
    }

    #[test]
    fn single_cell_link_outside_populated_area_is_kept() {
        let link = CellHyperlink {
            first_row: 9,
            first_column: 4,
            last_row: 9,
            last_column: 4,
            target: "https://example.com".into(),
        };
        assert_eq!(link.positions(1, 1), vec![(9, 4)]);
    }

    #[test]
    fn active_tab_selects_the_sheet_entry() {
        let layout = parse_workbook(
            r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
                <bookViews><workbookView activeTab="1"/></bookViews>
                <sheets>
                    <sheet name="Notes" sheetId="1" r:id="rId1"/>
                    <sheet name="Data" sheetId="2" r:id="rId2"/>
                </sheets>
            </workbook>"#,
        )
        .expect("workbook parsed");

        assert_eq!(layout.active_tab, 1);
        assert_eq!(
            layout.sheet_rel_ids,
            vec![Some("rId1".to_string()), Some("rId2".to_string())]
        );

        let default_view = parse_workbook(r#"<workbook><sheets><sheet name="Only" r:id="rId1"/></sheets></workbook>"#)
            .expect("workbook parsed");
        assert_eq!(default_view.active_tab, 0);
    }

    #[test]
    fn package_paths_resolve_relative_to_xl() {
        assert_eq!(resolve_part("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_part("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(
            rels_part_for("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }
}
