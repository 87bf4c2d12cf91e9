//! Common test utilities for building form schemas and payloads.
use formweave::prelude::*;
use serde_json::{Value, json};

/// A login form: `secret` is visible only to `admin`, `password` reads
/// `username` through a logic trigger.
#[allow(dead_code)]
pub fn login_schema() -> SchemaDocument {
    SchemaDocument::from_value(&json!({
        "components": [
            {
                "type": "columns",
                "key": "columns",
                "columns": [
                    {"components": [
                        {"type": "textfield", "key": "username", "label": "Username", "input": true,
                         "validate": {"required": true}, "tableView": true}
                    ]},
                    {"components": [
                        {"type": "password", "key": "password", "label": "Password", "input": true,
                         "logic": [{
                             "name": "lock",
                             "trigger": {"type": "json", "json": {"==": [{"var": "form.username"}, "guest"]}},
                             "actions": [{"type": "property", "property": {"value": "readOnly"}, "state": true}]
                         }]}
                    ]}
                ]
            },
            {
                "type": "textfield", "key": "secret", "label": "Secret", "input": true,
                "conditional": {"json": {"==": [{"var": "form.username"}, "admin"]}}
            },
            {"type": "button", "key": "submit", "label": "Submit", "input": true}
        ]
    }))
    .expect("login schema is valid")
}

/// An order form with a decimal price, a computed total and a row grid.
#[allow(dead_code)]
pub fn order_schema() -> SchemaDocument {
    SchemaDocument::from_value(&json!({
        "data_model": "order",
        "components": [
            {"type": "textfield", "key": "rec_name", "label": "Code", "input": true,
             "validate": {"unique": true, "required": true}},
            {"type": "number", "key": "price", "label": "Price", "input": true,
             "requireDecimal": true, "decimalLimit": 3, "validate": {"min": 0, "max": 1000}},
            {"type": "number", "key": "quantity", "label": "Quantity", "input": true, "defaultValue": 1},
            {"type": "number", "key": "total", "label": "Total", "input": true,
             "requireDecimal": true, "properties": {"calculateServer": "price*quantity"}},
            {"type": "checkbox", "key": "paid", "label": "Paid", "input": true},
            {"type": "datetime", "key": "due", "label": "Due", "input": true,
             "enableTime": true, "widget": {"minDate": null, "maxDate": null}},
            {
                "type": "panel", "key": "panel", "components": [
                    {"type": "datagrid", "key": "lines", "label": "Lines", "input": true,
                     "components": grid_components()}
                ]
            }
        ]
    }))
    .expect("order schema is valid")
}

/// Row components of the `lines` grid.
#[allow(dead_code)]
pub fn grid_components() -> Value {
    json!([
        {"type": "textfield", "key": "product", "label": "Product", "input": true},
        {"type": "number", "key": "amount", "label": "Amount", "input": true}
    ])
}

/// A select fed by inline values plus a resource select.
#[allow(dead_code)]
pub fn select_schema() -> SchemaDocument {
    SchemaDocument::from_value(&json!({
        "components": [
            {"type": "select", "key": "color", "label": "Color", "input": true, "dataSrc": "values",
             "data": {"values": [
                 {"label": "Red", "value": "red"},
                 {"label": "Green", "value": "green"}
             ]}},
            {"type": "select", "key": "sizes", "label": "Sizes", "input": true, "multiple": true,
             "data": {"values": [
                 {"label": "Small", "value": 1},
                 {"label": "Large", "value": 2}
             ]}},
            {"type": "select", "key": "customer", "label": "Customer", "input": true,
             "dataSrc": "resource", "template": "<span>{{ item.name.full }}</span>",
             "data": {"resource": "customers"}},
            {"type": "survey", "key": "feedback", "label": "Feedback", "input": true,
             "questions": [{"label": "Speed", "value": "speed"}, {"label": "Quality", "value": "quality"}],
             "values": [{"label": "Good", "value": "good"}, {"label": "Bad", "value": "bad"}]}
        ]
    }))
    .expect("select schema is valid")
}

/// Tabs and a well around a json textarea, a file, a day field and a
/// sub-form holding a grid of tables: `sub > rows > cells > n`.
#[allow(dead_code)]
pub fn composite_schema() -> SchemaDocument {
    SchemaDocument::from_value(&json!({
        "components": [
            {"type": "tabs", "key": "tabs", "components": [
                {"label": "Main", "key": "main", "components": [
                    {"type": "textarea", "key": "payload", "label": "Payload", "input": true,
                     "properties": {"type": "json"}},
                    {"type": "file", "key": "attachments", "label": "Attachments", "input": true}
                ]},
                {"label": "Dates", "key": "dates", "components": [
                    {"type": "day", "key": "birthday", "label": "Birthday", "input": true}
                ]}
            ]},
            {"type": "well", "key": "well", "components": [
                {"type": "form", "key": "sub", "label": "Sub", "input": true, "components": [
                    {"type": "datagrid", "key": "rows", "label": "Rows", "input": true, "components": [
                        {"type": "table", "key": "cells", "label": "Cells", "input": true,
                         "conditional": {"json": {"==": [{"var": "form.attachments"}, "none"]}},
                         "components": [
                             {"type": "number", "key": "n", "label": "N", "input": true}
                         ]}
                    ]}
                ]}
            ]}
        ]
    }))
    .expect("composite schema is valid")
}

/// Wraps record data the way rules address it: `form.<key>`.
#[allow(dead_code)]
pub fn form_context(data: Value) -> Value {
    json!({ "form": data })
}

/// Routes `tracing` output to the test harness; safe to call repeatedly.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn compile(name: &str, schema: &SchemaDocument) -> CompiledSchema {
    SchemaCompiler::new(name)
        .compile(schema)
        .expect("schema compiles")
}
