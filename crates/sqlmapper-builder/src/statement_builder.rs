//! Statement element parsing: include expansion, script assembly, and
//! mapped-statement construction.

use log::debug;

use sqlmapper_core::config::Configuration;
use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{KeyGeneratorKind, ResultSetType, SqlCommandType, StatementType};
use sqlmapper_core::parsing::{parse_placeholders, Element, Properties, XNode, XmlChild};
use sqlmapper_core::settings::shrink_whitespaces;

use crate::assistant::{MapperBuilderAssistant, StatementAttributes};

const MAX_INCLUDE_DEPTH: usize = 10;

/// Parse one `select|insert|update|delete` element and register the mapped
/// statement. Returns without registering when the database-id filter
/// rejects the element.
pub fn parse_statement_node(
    configuration: &mut Configuration,
    assistant: &MapperBuilderAssistant,
    element: &Element,
    required_database_id: Option<&str>,
) -> Result<()> {
    let variables = configuration.variables().clone();
    let node = XNode::new(element, &variables);

    let id = node.required_attribute("id")?;
    let database_id = node.string_attribute("databaseId");
    let full_id = assistant.apply_current_namespace(&id, false)?;
    if !database_id_matches_current(
        configuration,
        &full_id,
        database_id.as_deref(),
        required_database_id,
    ) {
        return Ok(());
    }

    let sql_command_type = SqlCommandType::from_element_name(node.name())?;
    let is_select = sql_command_type == SqlCommandType::Select;
    let flush_cache = node.bool_attribute("flushCache", !is_select)?;
    let use_cache = node.bool_attribute("useCache", is_select)?;
    let result_ordered = node.bool_attribute("resultOrdered", false)?;

    let expanded = apply_includes(element, configuration, assistant, 0)?;
    let mut script = XNode::new(&expanded, &variables).string_body();
    if configuration.settings().shrink_whitespaces_in_sql {
        script = shrink_whitespaces(&script);
    }
    let lang = node.string_attribute("lang");
    let driver = configuration.language_registry().driver(lang.as_deref())?;
    let sql_source = driver.create_sql_source(&script)?;

    let statement_type = match node.string_attribute("statementType") {
        Some(name) => StatementType::from_name(&name)?,
        None => StatementType::Prepared,
    };
    let result_set_type = match node.string_attribute("resultSetType") {
        Some(name) => Some(ResultSetType::from_name(&name)?),
        None => configuration.settings().default_result_set_type,
    };
    let parameter_type = match node.string_attribute("parameterType") {
        Some(alias) => Some(configuration.resolve_type(&alias)?),
        None => None,
    };
    let result_type = match node.string_attribute("resultType") {
        Some(alias) => Some(configuration.resolve_type(&alias)?),
        None => None,
    };
    let fetch_size = node
        .int_attribute("fetchSize")?
        .map(|v| v as u32)
        .or(configuration.settings().default_fetch_size);
    let timeout_ms = node
        .int_attribute("timeout")?
        .map(|v| v as u64)
        .or(configuration.settings().default_statement_timeout);

    let use_generated_keys = node.bool_attribute(
        "useGeneratedKeys",
        configuration.settings().use_generated_keys
            && sql_command_type == SqlCommandType::Insert,
    )?;
    let key_generator = if use_generated_keys {
        KeyGeneratorKind::Jdbc3
    } else {
        KeyGeneratorKind::None
    };
    let dirty_select = node.bool_attribute("affectData", false)?;

    let attributes = StatementAttributes {
        id,
        statement_type,
        sql_command_type,
        fetch_size,
        timeout_ms,
        parameter_map: node.string_attribute("parameterMap"),
        parameter_type,
        result_map: node.string_attribute("resultMap"),
        result_type,
        result_set_type,
        flush_cache,
        use_cache,
        result_ordered,
        key_generator,
        key_property: node.string_attribute("keyProperty"),
        key_column: node.string_attribute("keyColumn"),
        database_id,
        lang: lang.unwrap_or_else(|| {
            configuration
                .language_registry()
                .default_driver_name()
                .to_string()
        }),
        result_sets: node.string_attribute("resultSets"),
        dirty_select,
    };
    assistant.add_mapped_statement(configuration, sql_source, attributes)?;
    Ok(())
}

/// The two-pass database-id filter: with a required id only matching
/// elements pass; without one, tagged elements are skipped, as is a plain
/// element whose id was already taken by a tagged sibling.
pub fn database_id_matches_current(
    configuration: &Configuration,
    id: &str,
    database_id: Option<&str>,
    required_database_id: Option<&str>,
) -> bool {
    if let Some(required) = required_database_id {
        return database_id == Some(required);
    }
    if database_id.is_some() {
        return false;
    }
    if !configuration.has_statement(id) {
        return true;
    }
    configuration
        .mapped_statement(id)
        .map(|previous| previous.database_id.is_none())
        .unwrap_or(false)
}

/// Replace every `<include refid>` with the referenced fragment's children.
/// A fragment that is not yet registered fails incomplete so the statement
/// can be retried after more mappers load. `<selectKey>` bodies are not
/// part of the statement text and are dropped.
pub fn apply_includes(
    element: &Element,
    configuration: &Configuration,
    assistant: &MapperBuilderAssistant,
    depth: usize,
) -> Result<Element> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(Error::builder(
            "SQL fragment includes are nested too deeply; is there a circular reference?",
        ));
    }
    let mut out = Element::new(element.name());
    for (name, value) in element.attributes() {
        out.set_attribute(name, value);
    }
    for child in element.children() {
        match child {
            XmlChild::Text(text) => out.push_text(text.clone()),
            XmlChild::Element(child) if child.name() == "include" => {
                let refid = child.attribute("refid").ok_or_else(|| {
                    Error::builder("The <include> element requires a 'refid' attribute")
                })?;
                let refid = parse_placeholders(refid, configuration.variables());
                let refid = assistant.apply_current_namespace(&refid, true)?;
                let fragment = configuration.sql_fragment(&refid).ok_or_else(|| {
                    Error::incomplete(format!("Could not find SQL fragment '{}'", refid))
                })?;
                let local_properties = include_properties(child, configuration.variables())?;
                let expanded =
                    apply_includes(&fragment.clone(), configuration, assistant, depth + 1)?;
                for sub in expanded.children() {
                    match sub {
                        XmlChild::Text(text) => {
                            out.push_text(parse_placeholders(text, &local_properties));
                        }
                        XmlChild::Element(sub) => out.push_element(sub.clone()),
                    }
                }
            }
            XmlChild::Element(child) if child.name() == "selectKey" => {
                debug!("skipping <selectKey> body during script assembly");
            }
            XmlChild::Element(child) => {
                out.push_element(apply_includes(child, configuration, assistant, depth + 1)?);
            }
        }
    }
    Ok(out)
}

fn include_properties(include: &Element, variables: &Properties) -> Result<Properties> {
    let mut merged = variables.clone();
    let node = XNode::new(include, variables);
    merged.put_all(&node.children_as_properties()?);
    Ok(merged)
}
