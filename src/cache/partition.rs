//! Versioned partition naming.
//!
//! Partitions are named `{app}-{logical}-v{version}`. Bumping the version
//! makes every old partition fall out of the allow-list, and activation
//! deletes it.

/// The logical partitions this layer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
  /// Install manifest and other static files
  Static,
  /// API responses and page navigations
  Dynamic,
  Images,
}

impl Partition {
  pub const ALL: [Partition; 3] = [Partition::Static, Partition::Dynamic, Partition::Images];

  pub fn logical_name(self) -> &'static str {
    match self {
      Self::Static => "static",
      Self::Dynamic => "dynamic",
      Self::Images => "images",
    }
  }
}

/// Resolves logical partitions to their current versioned names.
#[derive(Debug, Clone)]
pub struct PartitionNames {
  prefix: String,
  version: u32,
}

impl PartitionNames {
  pub fn new(prefix: impl Into<String>, version: u32) -> Self {
    Self {
      prefix: prefix.into(),
      version,
    }
  }

  pub fn name(&self, partition: Partition) -> String {
    format!("{}-{}-v{}", self.prefix, partition.logical_name(), self.version)
  }

  /// Names that survive activation.
  pub fn allow_list(&self) -> Vec<String> {
    Partition::ALL.iter().map(|p| self.name(*p)).collect()
  }

  pub fn is_current(&self, name: &str) -> bool {
    Partition::ALL.iter().any(|p| self.name(*p) == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_are_versioned() {
    let names = PartitionNames::new("flow", 1);
    assert_eq!(names.name(Partition::Static), "flow-static-v1");
    assert_eq!(
      names.allow_list(),
      vec!["flow-static-v1", "flow-dynamic-v1", "flow-images-v1"]
    );
  }

  #[test]
  fn older_versions_are_not_current() {
    let names = PartitionNames::new("flow", 2);
    assert!(names.is_current("flow-images-v2"));
    assert!(!names.is_current("flow-images-v1"));
    assert!(!names.is_current("other-static-v2"));
  }
}
