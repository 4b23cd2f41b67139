//! `pgutils render` - offline template injection.
//!
//! Prints the composed query without touching a database:
//!
//! ```text
//! pgutils render "SELECT * FROM {t} WHERE id = {id}" --ident t=tile_index.bag --param id=42
//! ```

use anyhow::{Context, Result};
use clap::Args;
use pgutils_core::{
    Identifier, Literal, ParameterValue, Params, PgUtilsConfig, QualifiedIdentifier, Scalar,
    inject_parameters,
};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Query template with {name} placeholders
    pub template: String,

    /// Literal parameter. JSON scalars (42, 1.5, true, null, "42") keep their
    /// type; anything else is text.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub params: Vec<(String, String)>,

    /// Identifier parameter, either `name` or `schema.table`
    #[arg(long = "ident", value_name = "NAME=IDENT", value_parser = parse_assignment)]
    pub idents: Vec<(String, String)>,

    /// Identifier taken from the config file's relations, by dotted path
    #[arg(long = "relation", value_name = "NAME=PATH", value_parser = parse_assignment)]
    pub relations: Vec<(String, String)>,

    /// Collapse whitespace into a single line
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

pub(crate) fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got \"{s}\""))?;
    if name.is_empty() {
        return Err(format!("missing parameter name in \"{s}\""));
    }
    Ok((name.to_string(), value.to_string()))
}

fn literal_from_arg(value: &str) -> Literal {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => match Scalar::try_from(json) {
            Ok(scalar) => Literal::new(scalar),
            Err(_) => Literal::new(value),
        },
        Err(_) => Literal::new(value),
    }
}

fn identifier_from_arg(value: &str) -> Result<ParameterValue> {
    // A single (possibly quoted) name first, so `"dot.inside"` stays whole.
    if let Ok(ident) = Identifier::parse(value) {
        return Ok(ident.into());
    }
    let qualified = QualifiedIdentifier::parse(value)
        .with_context(|| format!("Invalid identifier: {value}"))?;
    Ok(qualified.into())
}

/// Build the parameters and inject them into the template.
pub fn run(args: &RenderArgs, config: &PgUtilsConfig) -> Result<String> {
    let mut params = Params::new();
    for (name, value) in &args.params {
        params.insert(name.as_str(), literal_from_arg(value));
    }
    for (name, value) in &args.idents {
        params.insert(name.as_str(), identifier_from_arg(value)?);
    }
    if !args.relations.is_empty() {
        let relations = config.relations().context("--relation needs --config")?;
        for (name, path) in &args.relations {
            let node = relations
                .path(path)
                .with_context(|| format!("Unknown relation path: {path}"))?;
            let value = ParameterValue::try_from(node)
                .with_context(|| format!("Relation {path} is not an identifier"))?;
            params.insert(name.as_str(), value);
        }
    }

    let query = inject_parameters(&args.template, &params).context("Failed to render template")?;
    Ok(if args.pretty {
        query.pretty()
    } else {
        query.into_string()
    })
}
