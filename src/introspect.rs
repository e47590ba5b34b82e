//! Text rendering of the tree and of component details for `scopectl`.

use scope_core::{Component, Microscope, VigilantAttribute};
use std::io::{self, Write};

/// Indentation used in front of a component `level` deep in the tree.
pub fn indent(level: usize) -> String {
    if level == 0 {
        String::new()
    } else {
        format!("{} ", " ↳".repeat(level))
    }
}

/// One line: name and role.
pub fn print_component(out: &mut impl Write, comp: &Component, level: usize) -> io::Result<()> {
    writeln!(out, "{}{}\trole:{}", indent(level), comp.name(), comp.role())
}

/// The whole tree, in the order of [`Microscope::walk`].
pub fn print_tree(out: &mut impl Write, microscope: &Microscope) -> io::Result<()> {
    for entry in microscope.walk() {
        print_component(out, &entry.component, entry.depth)?;
    }
    Ok(())
}

/// Role, affected components, properties, attributes and data flows.
pub fn print_attributes(out: &mut impl Write, comp: &Component) -> io::Result<()> {
    writeln!(out, "Component '{}':", comp.name())?;
    writeln!(out, "\trole: {}", comp.role())?;
    let affects: Vec<String> = comp
        .affects()
        .iter()
        .map(|c| format!("'{}'", c.name()))
        .collect();
    writeln!(out, "\taffects: {}", affects.join(", "))?;
    for (name, value) in comp.properties() {
        writeln!(out, "\t{name} (RO Attribute)\t value: {value}")?;
    }
    for (name, attr) in comp.attributes() {
        print_vattribute(out, name, attr.as_ref())?;
    }
    for name in comp.data_flows() {
        writeln!(out, "\t{name} (Data-flow)")?;
    }
    Ok(())
}

fn print_vattribute(out: &mut impl Write, name: &str, attr: &dyn VigilantAttribute) -> io::Result<()> {
    let value = attr.get();
    match attr.unit() {
        Some(unit) => writeln!(
            out,
            "\t{name} (Vigilant Attribute)\t value: {value} (unit: {unit})"
        ),
        None => writeln!(out, "\t{name} (Vigilant Attribute)\t value: {value}"),
    }
}
