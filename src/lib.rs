// SPDX-License-Identifier: Apache-2.0

mod char_iter;
mod error;
mod flow;
mod include;
mod map;
mod node;
mod overrides;
mod packer;
mod parser;
mod position;
mod presentation;
mod scalar;
mod sequence;
mod ser;
mod subfile;
mod variable;

pub use self::{
    error::{ErrorKind, RytError},
    node::{
        NodePath, PathSeg, YamlMapEntry, YamlNode, YamlNodeData,
        YamlNodeKind, YamlNodeMap, YamlTagProp,
    },
    packer::PackEnv,
    parser::{parse_file, parse_str, ParseOptions, YamlDocument},
    position::{RytPosition, RytSpan},
    presentation::{
        DocPresentation, Inclusion, OverrideRecord, Presentation,
    },
};
pub(crate) use self::{
    char_iter::CharsIter,
    presentation::{PresCursor, PresentationStore},
};
