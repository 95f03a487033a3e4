//! Class-info key/value pairs

/// One class-info entry (e.g. `plugin_iid = com.metaplug.Codec`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaClassInfo {
    name: String,
    value: String,
}

impl MetaClassInfo {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
