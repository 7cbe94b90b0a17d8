// SPDX-License-Identifier: Apache-2.0

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{YamlNode, YamlNodeData};

/// Serialize the semantic value of a node: presentation, spans and tags
/// are not part of the data model seen by other formats.
impl Serialize for YamlNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.data {
            YamlNodeData::Null => serializer.serialize_unit(),
            YamlNodeData::Bool(v) => serializer.serialize_bool(*v),
            YamlNodeData::Uint(v) => serializer.serialize_u64(*v),
            YamlNodeData::Int(v) => serializer.serialize_i64(*v),
            YamlNodeData::Double(v) => serializer.serialize_f64(*v),
            YamlNodeData::String(v) => serializer.serialize_str(v),
            YamlNodeData::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            YamlNodeData::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, entry) in map.iter() {
                    out.serialize_entry(key, &entry.value)?;
                }
                out.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{parse_str, ParseOptions};

    #[test]
    fn test_serialize_to_json() -> Result<(), Box<dyn std::error::Error>> {
        let doc = parse_str(
            "a: 1\nb: [ true, ~ ]\nc: { d: -2 }\n",
            &ParseOptions::default(),
        )?;
        assert_eq!(
            serde_json::to_string(&doc.root)?,
            r#"{"a":1,"b":[true,null],"c":{"d":-2}}"#
        );
        Ok(())
    }
}
