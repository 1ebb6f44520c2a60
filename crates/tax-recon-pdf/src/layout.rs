//! Backend independent page layout.
//!
//! A [`Composer`] flows headings, lines and tables top to bottom over A4
//! pages and produces a [`Document`]: a list of pages, each a list of
//! positioned [`Element`]s. Coordinates are millimetres from the top left
//! corner of the page; text `y` is the baseline.

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 18.0;

/// Detail tables put this many rows on each page.
pub const ROWS_PER_PAGE: usize = 30;

const PT_TO_MM: f32 = 0.3528;
const HEADER_ROW_HEIGHT: f32 = 8.0;
const ROW_HEIGHT: f32 = 6.5;
const CELL_PADDING: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);
    pub const WHITE: Color = Color(255, 255, 255);
    pub const GREY: Color = Color(105, 105, 105);
    pub const LIGHT_GREY: Color = Color(230, 230, 230);
    pub const BEIGE: Color = Color(245, 245, 220);
    pub const LAVENDER: Color = Color(230, 230, 250);
    pub const DARK_BLUE: Color = Color(0, 0, 139);
    pub const DARK_GREEN: Color = Color(0, 100, 0);
    pub const DARK_RED: Color = Color(139, 0, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        color: Color,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Color>,
        stroke: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|element| match element {
            Element::Text { text, .. } => Some(text.as_str()),
            Element::Rect { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

impl Document {
    /// Index of the first page containing `text`.
    pub fn find_page(&self, text: &str) -> Option<usize> {
        self.pages
            .iter()
            .position(|page| page.texts().any(|candidate| candidate == text))
    }

    pub fn contains(&self, text: &str) -> bool {
        self.find_page(text).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    /// Column widths in millimetres.
    pub widths: Vec<f32>,
    pub rows: Vec<Vec<String>>,
    pub header_fill: Color,
    pub body_fill: Color,
    pub font_size: f32,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>, widths: &[f32]) -> Self {
        Table {
            headers: headers.into_iter().map(Into::into).collect(),
            widths: widths.to_vec(),
            rows: Vec::new(),
            header_fill: Color::DARK_BLUE,
            body_fill: Color::LIGHT_GREY,
            font_size: 8.0,
        }
    }

    pub fn header_fill(mut self, color: Color) -> Self {
        self.header_fill = color;
        self
    }

    pub fn body_fill(mut self, color: Color) -> Self {
        self.body_fill = color;
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn height(&self, rows: usize) -> f32 {
        HEADER_ROW_HEIGHT + rows as f32 * ROW_HEIGHT
    }
}

pub struct Composer {
    title: String,
    pages: Vec<Page>,
    current: Page,
    cursor: f32,
}

impl Composer {
    pub fn new(title: impl Into<String>) -> Self {
        Composer {
            title: title.into(),
            pages: Vec::new(),
            current: Page::default(),
            cursor: MARGIN,
        }
    }

    /// Start a new page. Does nothing on a page that is still empty.
    pub fn page_break(&mut self) {
        if self.current.elements.is_empty() {
            return;
        }
        self.pages.push(std::mem::take(&mut self.current));
        self.cursor = MARGIN;
    }

    pub fn spacer(&mut self, height: f32) {
        self.cursor += height;
    }

    /// Move down to `y` on the current page.
    pub fn skip_to(&mut self, y: f32) {
        self.cursor = self.cursor.max(y);
    }

    pub fn heading(&mut self, text: &str, color: Color) {
        self.text(text, 16.0, Font::Bold, color);
        self.spacer(3.0);
    }

    pub fn subheading(&mut self, text: &str) {
        self.spacer(2.0);
        self.text(text, 12.0, Font::Bold, Color::BLACK);
        self.spacer(1.5);
    }

    pub fn line(&mut self, text: &str) {
        self.text(text, 10.0, Font::Regular, Color::BLACK);
    }

    pub fn bullet(&mut self, text: &str) {
        self.line(&format!("- {text}"));
    }

    pub fn centered(&mut self, text: &str, size: f32, font: Font, color: Color) {
        let height = line_height(size);
        self.ensure(height);
        let width = text_width(text, size);
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.cursor += height;
        self.push_text(x, self.cursor - size * PT_TO_MM * 0.3, size, font, color, text);
    }

    fn text(&mut self, text: &str, size: f32, font: Font, color: Color) {
        let height = line_height(size);
        self.ensure(height);
        self.cursor += height;
        let text = fit(text, PAGE_WIDTH - 2.0 * MARGIN, size);
        self.push_text(
            MARGIN,
            self.cursor - size * PT_TO_MM * 0.3,
            size,
            font,
            color,
            &text,
        );
    }

    /// Draw a whole table. Rows that do not fit continue on the next page
    /// below a repeated header row.
    pub fn table(&mut self, table: &Table) {
        self.ensure(table.height(table.rows.len().min(1)));
        self.header_row(table);
        for row in &table.rows {
            if self.remaining() < ROW_HEIGHT {
                self.page_break();
                self.header_row(table);
            }
            self.body_row(table, row);
        }
        self.spacer(4.0);
    }

    /// Draw a detail table [`ROWS_PER_PAGE`] rows at a time. Every chunk
    /// after the first starts a new page headed
    /// `"<title> (Continued - Records a to b)"`.
    pub fn paginated_table(&mut self, title: &str, table: &Table) {
        if table.rows.is_empty() {
            self.table(table);
            return;
        }
        for (chunk_index, chunk) in table.rows.chunks(ROWS_PER_PAGE).enumerate() {
            if chunk_index > 0 {
                self.page_break();
                let first = chunk_index * ROWS_PER_PAGE + 1;
                let last = first + chunk.len() - 1;
                self.subheading(&format!(
                    "{title} (Continued - Records {first} to {last})"
                ));
            }
            if self.remaining() < table.height(chunk.len()) {
                self.page_break();
            }
            self.header_row(table);
            for row in chunk {
                self.body_row(table, row);
            }
            self.spacer(4.0);
        }
    }

    pub fn finish(mut self) -> Document {
        self.page_break();
        Document {
            title: self.title,
            pages: self.pages,
        }
    }

    fn remaining(&self) -> f32 {
        PAGE_HEIGHT - MARGIN - self.cursor
    }

    fn ensure(&mut self, height: f32) {
        if self.remaining() < height {
            self.page_break();
        }
    }

    fn header_row(&mut self, table: &Table) {
        let cells: Vec<&str> = table.headers.iter().map(String::as_str).collect();
        self.row(
            table,
            &cells,
            HEADER_ROW_HEIGHT,
            table.header_fill,
            Font::Bold,
            Color::WHITE,
            table.font_size + 1.0,
        );
    }

    fn body_row(&mut self, table: &Table, row: &[String]) {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        self.row(
            table,
            &cells,
            ROW_HEIGHT,
            table.body_fill,
            Font::Regular,
            Color::BLACK,
            table.font_size,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn row(
        &mut self,
        table: &Table,
        cells: &[&str],
        height: f32,
        fill: Color,
        font: Font,
        color: Color,
        size: f32,
    ) {
        let top = self.cursor;
        let mut x = MARGIN;
        for (index, width) in table.widths.iter().copied().enumerate() {
            self.current.elements.push(Element::Rect {
                x,
                y: top,
                width,
                height,
                fill: Some(fill),
                stroke: true,
            });
            let cell = cells.get(index).copied().unwrap_or_default();
            if !cell.is_empty() {
                let text = fit(cell, width - 2.0 * CELL_PADDING, size);
                let baseline = top + (height + size * PT_TO_MM * 0.7) / 2.0;
                self.push_text(x + CELL_PADDING, baseline, size, font, color, &text);
            }
            x += width;
        }
        self.cursor += height;
    }

    fn push_text(&mut self, x: f32, y: f32, size: f32, font: Font, color: Color, text: &str) {
        self.current.elements.push(Element::Text {
            x,
            y,
            size,
            font,
            color,
            text: text.to_owned(),
        });
    }
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.4
}

// Helvetica averages roughly half an em per character
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * PT_TO_MM * 0.5
}

/// Cut `text` so it fits into `width` millimetres, marking the cut with `..`.
pub fn fit(text: &str, width: f32, size: f32) -> String {
    let max_chars = (width / (size * PT_TO_MM * 0.5)).floor().max(0.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    format!("{kept}..")
}
