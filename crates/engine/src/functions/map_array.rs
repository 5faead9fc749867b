use super::{FunctionLibrary, required_atomic, required_integer};
use crate::context::{ARRAY_NS, DynamicContext, MAP_NS};
use crate::error::MetapathError;
use crate::types::{ArrayItem, Item, MapItem, Sequence};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(MAP_NS, "get", 2, Some(2), map_get);
    library.add(MAP_NS, "contains", 2, Some(2), map_contains);
    library.add(MAP_NS, "keys", 1, Some(1), map_keys);
    library.add(MAP_NS, "size", 1, Some(1), map_size);
    library.add(MAP_NS, "entry", 2, Some(2), map_entry);
    library.add(MAP_NS, "put", 3, Some(3), map_put);
    library.add(ARRAY_NS, "size", 1, Some(1), array_size);
    library.add(ARRAY_NS, "get", 2, Some(2), array_get);
    library.add(ARRAY_NS, "append", 2, Some(2), array_append);
}

fn map_arg<'a, 't>(
    value: &'a Sequence<'t>,
    function: &str,
) -> Result<&'a MapItem<'t>, MetapathError> {
    match value.exactly_one(function)? {
        Item::Map(map) => Ok(map),
        other => Err(MetapathError::type_error(format!(
            "{} requires a map, got {}",
            function,
            other.type_name()
        ))),
    }
}

fn array_arg<'a, 't>(
    value: &'a Sequence<'t>,
    function: &str,
) -> Result<&'a ArrayItem<'t>, MetapathError> {
    match value.exactly_one(function)? {
        Item::Array(array) => Ok(array),
        other => Err(MetapathError::type_error(format!(
            "{} requires an array, got {}",
            function,
            other.type_name()
        ))),
    }
}

fn map_get<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let map = map_arg(&args[0], "map:get")?;
    let key = required_atomic(&args[1], "map:get")?;
    Ok(map.get(&key).cloned().unwrap_or_default())
}

fn map_contains<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let map = map_arg(&args[0], "map:contains")?;
    let key = required_atomic(&args[1], "map:contains")?;
    Ok(Sequence::boolean(map.contains_key(&key)))
}

fn map_keys<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let map = map_arg(&args[0], "map:keys")?;
    Ok(Sequence::from_atomics(map.keys().cloned()))
}

fn map_size<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::integer(map_arg(&args[0], "map:size")?.len() as i64))
}

fn map_entry<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let value = args.remove(1);
    let key = required_atomic(&args[0], "map:entry")?;
    let entries = [(key, value)].into_iter().collect();
    Ok(Sequence::from_item(Item::Map(MapItem::from_entries(entries))))
}

/// A copy of the map with `key` bound to `value`, replacing any existing
/// entry in place.
fn map_put<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let value = args.remove(2);
    let key = required_atomic(&args[1], "map:put")?;
    let mut entries: indexmap::IndexMap<_, _> = map_arg(&args[0], "map:put")?
        .entries()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.insert(key, value);
    Ok(Sequence::from_item(Item::Map(MapItem::from_entries(entries))))
}

fn array_size<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::integer(array_arg(&args[0], "array:size")?.len() as i64))
}

fn array_get<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let array = array_arg(&args[0], "array:get")?;
    let index = required_integer(&args[1], "array:get")?;
    array.get(index).cloned()
}

fn array_append<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let member = args.remove(1);
    let mut members = array_arg(&args[0], "array:append")?.members().to_vec();
    members.push(member);
    Ok(Sequence::from_item(Item::Array(ArrayItem::from_members(members))))
}
