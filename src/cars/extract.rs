//! Extraction pipeline for the car list page.
//!
//! The wiki's markup is not versioned: the table class, the cell marker
//! styles and the image link strategy have all changed between revisions of
//! the page. Every locator here is therefore an ordered list of candidates
//! tried in priority order, and every field extractor degrades to a
//! documented default instead of failing the row.

use super::Car;
use lazy_regex::regex;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// Schema coverage below this many cells skips the row.
const MIN_CELLS: usize = 11;

const E: &str = "Invalid selector";
lazy_static! {
    static ref TABLE_CANDIDATES: Vec<(&'static str, Selector)> =
        ["table.article-table", "table.wikitable"]
            .iter()
            .map(|css| (*css, Selector::parse(css).expect(E)))
            .collect();
    static ref TR: Selector = Selector::parse("tr").expect(E);
    static ref TD: Selector = Selector::parse("td").expect(E);
    static ref A: Selector = Selector::parse("a").expect(E);
    static ref IMG: Selector = Selector::parse("img").expect(E);
    static ref FILE_LINK: Selector =
        Selector::parse("a.mw-file-description, a.image").expect(E);
    static ref STYLED_DIV: Selector = Selector::parse("div[style]").expect(E);
    static ref STYLED_SPAN: Selector = Selector::parse("span[style]").expect(E);
}

/// No candidate selector matched a table in the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No table matched any of the candidate selectors")]
pub struct TableNotFound;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewCells(usize),
    EmptyName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewCells(n) => {
                write!(f, "only {} of {} expected cells present", n, MIN_CELLS)
            }
            SkipReason::EmptyName => write!(f, "no display name in the name cell"),
        }
    }
}

/// Per-row result. Logging happens at the boundary that consumes these, the
/// parser itself stays silent.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(Car),
    Skipped { row: usize, reason: SkipReason },
}

/// Finds the car table, trying each candidate selector in priority order.
/// Returns the matched selector alongside the node so drift shows up in the
/// logs rather than as silent data loss.
pub fn locate_table(doc: &Html) -> Result<(ElementRef<'_>, &'static str), TableNotFound> {
    for (css, selector) in TABLE_CANDIDATES.iter() {
        if let Some(table) = doc.select(selector).next() {
            return Ok((table, *css));
        }
    }
    Err(TableNotFound)
}

/// Walks the table's rows, skipping the header row unconditionally. Rows
/// with insufficient cells or no usable name are skipped with a reason;
/// nothing here panics or aborts the batch.
pub fn parse_rows(table: ElementRef<'_>) -> Vec<RowOutcome> {
    table
        .select(&TR)
        .skip(1)
        .enumerate()
        .map(|(row, tr)| {
            let cells: Vec<ElementRef> = tr.select(&TD).collect();
            if cells.len() < MIN_CELLS {
                return RowOutcome::Skipped {
                    row,
                    reason: SkipReason::TooFewCells(cells.len()),
                };
            }

            let (name, year) = name_and_year(cells[1]);
            if name.is_empty() {
                return RowOutcome::Skipped {
                    row,
                    reason: SkipReason::EmptyName,
                };
            }

            let (class_letter, class_number) = match cells.get(11) {
                Some(cell) => class_fields(*cell),
                None => (None, None),
            };

            RowOutcome::Parsed(Car {
                name,
                year,
                image_url: image_url(cells[0]),
                price: price(cells[5]),
                rarity: rarity(cells[5]),
                speed: stat(cells[6]),
                handling: stat(cells[7]),
                acceleration: stat(cells[8]),
                launch: stat(cells[9]),
                braking: stat(cells[10]),
                class_letter,
                class_number,
                source: source_label(cells[1]),
            })
        })
        .collect()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn style_contains(el: &ElementRef<'_>, needle: &str) -> bool {
    el.value().attr("style").map_or(false, |s| s.contains(needle))
}

fn digits(text: &str) -> i32 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Splits the display text into name and model year. The nested link's text
/// is preferred over the cell's own text, which also carries the source
/// marker. The first 4-digit token in [1900, 2099] is the year; it is
/// removed from the name verbatim.
pub fn name_and_year(name_cell: ElementRef<'_>) -> (String, Option<i32>) {
    let display = match name_cell.select(&A).next() {
        Some(link) => text_of(link),
        None => text_of(name_cell),
    };

    match regex!(r"\b(19|20)\d{2}\b").find(&display) {
        Some(token) => {
            let year = token.as_str().parse().ok();
            let name = display.replacen(token.as_str(), "", 1).trim().to_string();
            (name, year)
        }
        None => (display, None),
    }
}

/// Resource reference for the car image. Later page revisions wrap the
/// thumbnail in a file-description link; its href wins over the raw img src.
pub fn image_url(img_cell: ElementRef<'_>) -> Option<String> {
    if let Some(href) = img_cell
        .select(&FILE_LINK)
        .find_map(|a| a.value().attr("href"))
    {
        return Some(href.to_string());
    }
    img_cell
        .select(&IMG)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(ToString::to_string)
}

/// Acquisition source ("Autoshow", a showcase reward, ...), signalled by a
/// small-font div inside the name cell. Matched on style fragments, not the
/// full style string, since the exact declaration has drifted.
pub fn source_label(name_cell: ElementRef<'_>) -> String {
    name_cell
        .select(&STYLED_DIV)
        .find(|div| style_contains(div, "font-size") && style_contains(div, "smaller"))
        .map(text_of)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Price in credits: digits of the line-height-styled div, 0 when the
/// marker is absent or carries no digits.
pub fn price(price_cell: ElementRef<'_>) -> i32 {
    price_cell
        .select(&STYLED_DIV)
        .find(|div| style_contains(div, "line-height"))
        .map(|div| digits(&text_of(div)))
        .unwrap_or(0)
}

/// Rarity tier, signalled by a background-colored span in the price cell.
pub fn rarity(price_cell: ElementRef<'_>) -> String {
    price_cell
        .select(&STYLED_SPAN)
        .find(|span| style_contains(span, "background-color"))
        .map(text_of)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// One performance figure (speed, handling, ...). Empty or unparsable cell
/// text is a 0, not a row failure.
pub fn stat(cell: ElementRef<'_>) -> f64 {
    text_of(cell).parse().unwrap_or(0.0)
}

/// Class letter and performance-index number. The two spans are told apart
/// by their style content: the letter badge carries a background color, the
/// number badge a border. Each is None when its span is missing; a number
/// span without digits yields 0.
pub fn class_fields(class_cell: ElementRef<'_>) -> (Option<String>, Option<i32>) {
    let letter = class_cell
        .select(&STYLED_SPAN)
        .find(|span| style_contains(span, "background-color"))
        .map(text_of);
    let number = class_cell
        .select(&STYLED_SPAN)
        .find(|span| style_contains(span, "border"))
        .map(|span| digits(&text_of(span)));
    (letter, number)
}
