//! Reconciling table: an ordered, append-mostly collection of rows kept
//! in sync with incrementally arriving data.
//!
//! Rows are plain JSON objects merged shallowly on update; every cell is
//! rebuilt from the merged row state, so what is displayed is always a
//! pure function of the data accumulated for that row. Columns are
//! declarative: the table itself never hard-codes a field name.

use std::collections::HashMap;

use serde_json::Value;

use crate::renderer::{NodeId, Renderer};

pub const NON_BREAKING_SPACE: &str = "\u{a0}";

type Accessor = Box<dyn Fn(&Value) -> Option<Value>>;
type ClassFn = Box<dyn Fn(&Value) -> Option<String>>;
type ActivateFn = Box<dyn Fn(&Value)>;

/// One class rule on a column: a literal name applies unconditionally
/// (headers included); a computed rule sees the row's merged data and
/// may decline. Names accumulate, they do not exclude each other.
pub enum ClassSpec {
    Literal(String),
    Computed(ClassFn),
}

impl ClassSpec {
    fn evaluate(&self, data: &Value) -> Option<String> {
        match self {
            Self::Literal(name) => Some(name.clone()),
            Self::Computed(rule) => rule(data),
        }
    }
}

/// Presentation rule for one column. The accessor may fail against a
/// given row shape (heterogeneous rows are expected); a failed access
/// renders as a blank cell.
pub struct Column {
    label: String,
    group: Option<String>,
    get: Accessor,
    classes: Vec<ClassSpec>,
    activate: Option<ActivateFn>,
}

impl Column {
    pub fn new(
        label: impl Into<String>,
        get: impl Fn(&Value) -> Option<Value> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            group: None,
            get: Box::new(get),
            classes: Vec::new(),
            activate: None,
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn class(mut self, name: impl Into<String>) -> Self {
        self.classes.push(ClassSpec::Literal(name.into()));
        self
    }

    pub fn class_fn(mut self, rule: impl Fn(&Value) -> Option<String> + 'static) -> Self {
        self.classes.push(ClassSpec::Computed(Box::new(rule)));
        self
    }

    pub fn on_activate(mut self, action: impl Fn(&Value) + 'static) -> Self {
        self.activate = Some(Box::new(action));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Stable handle to an appended row; survives updates, dies on removal.
/// Ids are handed out in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

struct Cell {
    node: NodeId,
    lines: Vec<NodeId>,
}

struct TableRow {
    node: NodeId,
    cells: Vec<Cell>,
    data: Value,
}

pub struct Table {
    columns: Vec<Column>,
    root: NodeId,
    header: Option<NodeId>,
    body: Option<NodeId>,
    footer: Option<NodeId>,
    footer_rows: Vec<NodeId>,
    body_nodes: Vec<NodeId>,
    rows: HashMap<RowId, TableRow>,
    next_row: u64,
}

impl Table {
    /// Builds the table shell: a group-header row when any column
    /// declares a group, then the label row.
    pub fn new<R: Renderer>(renderer: &mut R, columns: Vec<Column>) -> Self {
        let root = renderer.create_container();
        let mut table = Self {
            columns,
            root,
            header: None,
            body: None,
            footer: None,
            footer_rows: Vec::new(),
            body_nodes: Vec::new(),
            rows: HashMap::new(),
            next_row: 0,
        };
        table.append_group_row(renderer);
        table.append_header_row(renderer);
        table
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body_node(&self) -> Option<NodeId> {
        self.body
    }

    pub fn footer_node(&self) -> Option<NodeId> {
        self.footer
    }

    pub fn row_node(&self, row: RowId) -> Option<NodeId> {
        self.rows.get(&row).map(|row| row.node)
    }

    pub fn row_data(&self, row: RowId) -> Option<&Value> {
        self.rows.get(&row).map(|row| &row.data)
    }

    /// Live row handles in append order (blank separators have none).
    pub fn row_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.rows.keys().copied().collect();
        ids.sort();
        ids
    }

    fn append_group_row<R: Renderer>(&mut self, renderer: &mut R) {
        struct Group {
            label: Option<String>,
            colspan: usize,
            leading: bool,
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group {
            label: None,
            colspan: 0,
            leading: true,
        };
        for column in &self.columns {
            if column.group != current.label {
                groups.push(current);
                current = Group {
                    label: column.group.clone(),
                    colspan: 1,
                    leading: false,
                };
            } else {
                current.colspan += 1;
            }
        }
        // No column declared a group: everything pooled into the leading
        // placeholder and there is nothing to render.
        if current.leading {
            return;
        }
        groups.push(current);

        let row = renderer.create_container();
        for group in &groups {
            let cell = renderer.create_container();
            renderer.set_attribute(cell, "colspan", &group.colspan.to_string());
            if let Some(label) = &group.label {
                let text = renderer.create_container();
                renderer.add_class(text, "group");
                renderer.set_text(text, label);
                renderer.append_child(cell, text);
            }
            renderer.append_child(row, cell);
        }
        let header = self.ensure_header(renderer);
        renderer.append_child(header, row);
    }

    fn append_header_row<R: Renderer>(&mut self, renderer: &mut R) {
        let row = renderer.create_container();
        for column in &self.columns {
            let cell = renderer.create_container();
            let text = renderer.create_container();
            renderer.set_text(text, &column.label);
            // Header cells carry the literal column classes; computed
            // rules see no row and usually decline.
            for spec in &column.classes {
                if let Some(class) = spec.evaluate(&Value::Null) {
                    renderer.add_class(text, &class);
                }
            }
            renderer.append_child(cell, text);
            renderer.append_child(row, cell);
        }
        let header = self.ensure_header(renderer);
        renderer.append_child(header, row);
    }

    fn ensure_header<R: Renderer>(&mut self, renderer: &mut R) -> NodeId {
        ensure_section(renderer, self.root, &mut self.header)
    }

    fn ensure_body<R: Renderer>(&mut self, renderer: &mut R) -> NodeId {
        ensure_section(renderer, self.root, &mut self.body)
    }

    fn ensure_footer<R: Renderer>(&mut self, renderer: &mut R) -> NodeId {
        ensure_section(renderer, self.root, &mut self.footer)
    }

    /// Appends a row built from `data` and scrolls it into view.
    pub fn append_row<R: Renderer>(&mut self, renderer: &mut R, data: Value) -> RowId {
        let body = self.ensure_body(renderer);
        let row = build_row(renderer, &self.columns, data);
        renderer.append_child(body, row.node);
        renderer.scroll_into_view(row.node);
        self.body_nodes.push(row.node);

        let id = RowId(self.next_row);
        self.next_row += 1;
        self.rows.insert(id, row);
        id
    }

    /// Merges `patch` into the row's retained data and rebuilds every
    /// cell from the merged state. Unknown handles are ignored (the row
    /// may have been retracted).
    pub fn update_row<R: Renderer>(&mut self, renderer: &mut R, id: RowId, patch: Value) {
        let Some(row) = self.rows.get_mut(&id) else {
            return;
        };
        merge_into(&mut row.data, patch);
        for (column, cell) in self.columns.iter().zip(row.cells.iter_mut()) {
            rebuild_cell(renderer, column, cell, &row.data);
        }
    }

    /// Retracts a previously appended row.
    pub fn remove_row<R: Renderer>(&mut self, renderer: &mut R, id: RowId) {
        if let Some(row) = self.rows.remove(&id) {
            self.body_nodes.retain(|node| *node != row.node);
            renderer.remove(row.node);
        }
    }

    /// Removes every body row, blanks included. The header and footer
    /// survive; the next append reuses the existing body section.
    pub fn clear_body<R: Renderer>(&mut self, renderer: &mut R) {
        for node in self.body_nodes.drain(..) {
            renderer.remove(node);
        }
        self.rows.clear();
    }

    /// Number of body rows currently visible, blank separators included.
    pub fn body_row_count(&self) -> usize {
        self.body_nodes.len()
    }

    /// Appends a blank separator row spanning all columns.
    pub fn append_blank_row<R: Renderer>(&mut self, renderer: &mut R) {
        let body = self.ensure_body(renderer);
        let row = renderer.create_container();
        let cell = renderer.create_container();
        renderer.set_attribute(cell, "colspan", &self.columns.len().to_string());
        renderer.set_text(cell, NON_BREAKING_SPACE);
        renderer.append_child(row, cell);
        renderer.append_child(body, row);
        renderer.scroll_into_view(row);
        self.body_nodes.push(row);
    }

    /// Invokes the activation rule of the given column with the row's
    /// merged data (the drill-down affordance).
    pub fn activate(&self, id: RowId, column: usize) {
        let Some(row) = self.rows.get(&id) else {
            return;
        };
        if let Some(action) = self.columns.get(column).and_then(|col| col.activate.as_ref()) {
            action(&row.data);
        }
    }

    pub fn clear_footer<R: Renderer>(&mut self, renderer: &mut R) {
        for node in self.footer_rows.drain(..) {
            renderer.remove(node);
        }
    }

    /// Appends a footer row, optionally with an alternate column set
    /// (the totals footer renders richer cells than the body).
    pub fn append_footer_row<R: Renderer>(
        &mut self,
        renderer: &mut R,
        data: Value,
        columns: Option<&[Column]>,
    ) -> NodeId {
        let footer = self.ensure_footer(renderer);
        let row = build_row(renderer, columns.unwrap_or(&self.columns), data);
        renderer.append_child(footer, row.node);
        self.footer_rows.push(row.node);
        row.node
    }
}

fn ensure_section<R: Renderer>(
    renderer: &mut R,
    root: NodeId,
    section: &mut Option<NodeId>,
) -> NodeId {
    match section {
        Some(node) => *node,
        None => {
            let node = renderer.create_container();
            renderer.append_child(root, node);
            *section = Some(node);
            node
        }
    }
}

fn build_row<R: Renderer>(renderer: &mut R, columns: &[Column], data: Value) -> TableRow {
    let node = renderer.create_container();
    let mut cells = Vec::with_capacity(columns.len());
    for column in columns {
        let cell_node = renderer.create_container();
        let mut cell = Cell {
            node: cell_node,
            lines: Vec::new(),
        };
        rebuild_cell(renderer, column, &mut cell, &data);
        renderer.append_child(node, cell_node);
        cells.push(cell);
    }
    TableRow { node, cells, data }
}

/// Discards the cell's previous visual state and rebuilds it: one line
/// container per `\n`-separated line of the accessor's text, each
/// carrying the column's accumulated classes.
fn rebuild_cell<R: Renderer>(renderer: &mut R, column: &Column, cell: &mut Cell, data: &Value) {
    for line in cell.lines.drain(..) {
        renderer.remove(line);
    }

    let text = cell_text((column.get)(data));
    for line in text.split('\n') {
        let node = renderer.create_container();
        renderer.set_text(node, line);
        for spec in &column.classes {
            if let Some(class) = spec.evaluate(data) {
                renderer.add_class(node, &class);
            }
        }
        renderer.append_child(cell.node, node);
        cell.lines.push(node);
    }
}

/// Falsy accessor results (missing field, null, zero, empty string)
/// render blank; this is the dashboard's empty-cell convention for
/// heterogeneous row shapes.
fn cell_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Bool(flag)) => {
            if flag {
                "true".to_string()
            } else {
                String::new()
            }
        }
        Some(Value::Number(number)) => {
            if number.as_f64() == Some(0.0) {
                String::new()
            } else {
                number.to_string()
            }
        }
        Some(other) => other.to_string(),
    }
}

fn merge_into(data: &mut Value, patch: Value) {
    let Value::Object(patch) = patch else {
        return;
    };
    if !data.is_object() {
        *data = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = data {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{Column, Table};
    use crate::renderer::{NodeId, TreeRenderer};

    fn name_and_time_columns() -> Vec<Column> {
        vec![
            Column::new("Room", |row| row.get("room_name").cloned()),
            Column::new("Time", |row| row.get("time").cloned())
                .class("time")
                .class_fn(|row| {
                    row.get("slow")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                        .then(|| "red".to_string())
                }),
        ]
    }

    fn cell_line_text(renderer: &TreeRenderer, row: NodeId, cell: usize, line: usize) -> String {
        let cell = renderer.children(row)[cell];
        let line = renderer.children(cell)[line];
        renderer.node(line).expect("line node").text.clone()
    }

    #[test]
    fn unit_construction_builds_header_without_group_row() {
        let mut renderer = TreeRenderer::new();
        let table = Table::new(&mut renderer, name_and_time_columns());
        // header section only; body and footer are lazy
        assert_eq!(renderer.child_count(table.root()), 1);
        let header = renderer.children(table.root())[0];
        assert_eq!(renderer.child_count(header), 1);
        assert_eq!(renderer.text_content(header), "Room Time");
    }

    #[test]
    fn unit_construction_builds_group_row_with_merged_spans() {
        let mut renderer = TreeRenderer::new();
        let columns = vec![
            Column::new("Timestamp", |row| row.get("timestamp").cloned()),
            Column::new("Game", |row| row.get("rg").cloned()).group("Room"),
            Column::new("Real", |row| row.get("rr").cloned()).group("Room"),
            Column::new("Game", |row| row.get("dg").cloned()).group("Door"),
        ];
        let table = Table::new(&mut renderer, columns);
        let header = renderer.children(table.root())[0];
        assert_eq!(renderer.child_count(header), 2);

        let group_row = renderer.children(header)[0];
        // leading ungrouped run, Room, Door
        assert_eq!(renderer.child_count(group_row), 3);
        let cells = renderer.children(group_row).to_vec();
        let colspan = |cell: NodeId| {
            renderer
                .node(cell)
                .and_then(|node| node.attribute("colspan").map(str::to_string))
        };
        assert_eq!(colspan(cells[0]).as_deref(), Some("1"));
        assert_eq!(colspan(cells[1]).as_deref(), Some("2"));
        assert_eq!(colspan(cells[2]).as_deref(), Some("1"));
        assert_eq!(renderer.text_content(group_row), "Room Door");
    }

    #[test]
    fn unit_header_cells_carry_literal_classes_only() {
        let mut renderer = TreeRenderer::new();
        let table = Table::new(&mut renderer, name_and_time_columns());
        let header = renderer.children(table.root())[0];
        let label_row = renderer.children(header)[0];
        let time_header = renderer.children(label_row)[1];
        let text = renderer.children(time_header)[0];
        let node = renderer.node(text).expect("header text node");
        assert!(node.has_class("time"));
        assert!(!node.has_class("red"));
    }

    #[test]
    fn functional_append_row_renders_cells_and_scrolls() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        let row = table.append_row(
            &mut renderer,
            json!({ "room_name": "Main Shaft", "time": "6'18", "slow": true }),
        );

        let row_node = table.row_node(row).expect("row node");
        assert_eq!(renderer.text_content(row_node), "Main Shaft 6'18");
        assert_eq!(renderer.last_scrolled(), Some(row_node));

        let time_line = renderer.children(renderer.children(row_node)[1])[0];
        let node = renderer.node(time_line).expect("cell line");
        assert!(node.has_class("time"));
        assert!(node.has_class("red"));
    }

    #[test]
    fn functional_update_row_merges_fields_and_rebuilds_cells() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        let row = table.append_row(
            &mut renderer,
            json!({ "room_name": "Main Shaft", "time": "6'18", "slow": true }),
        );
        table.update_row(&mut renderer, row, json!({ "time": "6'02", "slow": false }));

        let row_node = table.row_node(row).expect("row node");
        assert_eq!(renderer.text_content(row_node), "Main Shaft 6'02");
        let time_line = renderer.children(renderer.children(row_node)[1])[0];
        let node = renderer.node(time_line).expect("cell line");
        // Class list was rebuilt from the merged state, not patched.
        assert!(node.has_class("time"));
        assert!(!node.has_class("red"));
        assert_eq!(
            table.row_data(row),
            Some(&json!({ "room_name": "Main Shaft", "time": "6'02", "slow": false }))
        );
    }

    #[test]
    fn functional_failed_accessor_renders_blank_cell() {
        let mut renderer = TreeRenderer::new();
        let columns = vec![Column::new("Count", |row| {
            row.get("stats").and_then(|stats| stats.get("count")).cloned()
        })];
        let mut table = Table::new(&mut renderer, columns);
        let row = table.append_row(&mut renderer, json!({ "unrelated": true }));
        let row_node = table.row_node(row).expect("row node");
        assert_eq!(cell_line_text(&renderer, row_node, 0, 0), "");
    }

    #[test]
    fn unit_zero_and_null_render_blank() {
        let mut renderer = TreeRenderer::new();
        let columns = vec![Column::new("#", |row| row.get("attempts").cloned())];
        let mut table = Table::new(&mut renderer, columns);
        let zero = table.append_row(&mut renderer, json!({ "attempts": 0 }));
        let null = table.append_row(&mut renderer, json!({ "attempts": null }));
        let some = table.append_row(&mut renderer, json!({ "attempts": 12 }));
        let text = |id| {
            let node = table.row_node(id).expect("row");
            cell_line_text(&renderer, node, 0, 0)
        };
        assert_eq!(text(zero), "");
        assert_eq!(text(null), "");
        assert_eq!(text(some), "12");
    }

    #[test]
    fn functional_multiline_text_renders_one_container_per_line() {
        let mut renderer = TreeRenderer::new();
        let columns = vec![Column::new("±Best", |row| row.get("delta").cloned()).class("time")];
        let mut table = Table::new(&mut renderer, columns);
        let row = table.append_row(&mut renderer, json!({ "delta": "+0'10\n38'20" }));
        let row_node = table.row_node(row).expect("row node");
        let cell = renderer.children(row_node)[0];
        assert_eq!(renderer.child_count(cell), 2);
        assert_eq!(cell_line_text(&renderer, row_node, 0, 0), "+0'10");
        assert_eq!(cell_line_text(&renderer, row_node, 0, 1), "38'20");
        for line in renderer.children(cell) {
            assert!(renderer.node(*line).expect("line").has_class("time"));
        }
    }

    #[test]
    fn functional_remove_row_then_append_keeps_row_count_stable() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        table.append_row(&mut renderer, json!({ "room_name": "A" }));
        let provisional = table.append_row(&mut renderer, json!({ "room_name": "Segment" }));
        let body = table.body_node().expect("body");
        let before = renderer.child_count(body);

        table.remove_row(&mut renderer, provisional);
        table.append_row(&mut renderer, json!({ "room_name": "Segment" }));
        assert_eq!(renderer.child_count(body), before);
        assert!(table.row_node(provisional).is_none());
    }

    #[test]
    fn unit_blank_row_spans_all_columns() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        table.append_blank_row(&mut renderer);
        let body = table.body_node().expect("body");
        let blank = renderer.children(body)[0];
        let cell = renderer.children(blank)[0];
        assert_eq!(renderer.node(cell).expect("cell").attribute("colspan"), Some("2"));
        assert_eq!(renderer.node(cell).expect("cell").text, "\u{a0}");
    }

    #[test]
    fn functional_footer_replace_is_independent_of_body_rows() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        table.append_row(&mut renderer, json!({ "room_name": "A", "time": "1'00" }));
        table.append_footer_row(&mut renderer, json!({ "room_name": "Total" }), None);
        table.clear_footer(&mut renderer);
        table.append_footer_row(&mut renderer, json!({ "room_name": "Total", "time": "2'00" }), None);

        let footer = table.footer_node().expect("footer");
        assert_eq!(renderer.child_count(footer), 1);
        assert_eq!(renderer.text_content(footer), "Total 2'00");
        let body = table.body_node().expect("body");
        assert_eq!(renderer.child_count(body), 1);
    }

    #[test]
    fn functional_clear_body_keeps_header_and_footer() {
        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, name_and_time_columns());
        table.append_row(&mut renderer, json!({ "room_name": "A" }));
        table.append_blank_row(&mut renderer);
        table.append_row(&mut renderer, json!({ "room_name": "B" }));
        table.append_footer_row(&mut renderer, json!({ "room_name": "Total" }), None);
        assert_eq!(table.body_row_count(), 3);

        table.clear_body(&mut renderer);
        assert_eq!(table.body_row_count(), 0);
        let body = table.body_node().expect("body");
        assert_eq!(renderer.child_count(body), 0);
        assert_eq!(renderer.text_content(table.footer_node().expect("footer")), "Total");
        // Appends keep working against the same body section.
        table.append_row(&mut renderer, json!({ "room_name": "C" }));
        assert_eq!(renderer.child_count(body), 1);
    }

    #[test]
    fn unit_activate_runs_the_column_action_with_merged_data() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let captured = Rc::new(RefCell::new(None::<Value>));
        let sink = Rc::clone(&captured);
        let columns = vec![
            Column::new("Room", |row| row.get("room_name").cloned())
                .class("link")
                .on_activate(move |row| {
                    *sink.borrow_mut() = row.get("room").cloned();
                }),
        ];

        let mut renderer = TreeRenderer::new();
        let mut table = Table::new(&mut renderer, columns);
        let row = table.append_row(
            &mut renderer,
            json!({ "room_name": "Main Shaft", "room": { "room_id": "caf6" } }),
        );
        table.activate(row, 0);
        assert_eq!(*captured.borrow(), Some(json!({ "room_id": "caf6" })));
    }
}
