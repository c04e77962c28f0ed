use crate::context::RunContext;
use crate::descriptor::{split_labels, TestDescriptor, TestPlan};
use crate::error::DiscoveryError;
use std::collections::HashMap;

/// Statically declared test unit, submitted through [`test_unit!`](crate::test_unit).
#[derive(Debug)]
pub struct TestRegistration {
  pub name: &'static str,
  pub body: fn(&mut RunContext) -> anyhow::Result<()>,
  pub skip: bool,
  pub sequence: i64,
  pub label: &'static str,
  pub plan: Option<StaticPlan>,
}

#[derive(Debug, Clone, Copy)]
pub struct StaticPlan {
  pub description: &'static str,
  pub prepared_by: &'static str,
  pub prepared_date: &'static str,
  pub reviewed_by: &'static str,
  pub reviewed_date: &'static str,
}

impl StaticPlan {
  pub const UNSET: StaticPlan = StaticPlan {
    description: "",
    prepared_by: "",
    prepared_date: "",
    reviewed_by: "",
    reviewed_date: "",
  };

  fn to_plan(self) -> TestPlan {
    TestPlan::new(self.description)
      .prepared(self.prepared_by, self.prepared_date)
      .reviewed(self.reviewed_by, self.reviewed_date)
  }
}

fn unset_body(_ctx: &mut RunContext) -> anyhow::Result<()> {
  Ok(())
}

impl TestRegistration {
  /// Field defaults for [`test_unit!`](crate::test_unit); `name` and `body`
  /// are always overridden.
  pub const DEFAULT: TestRegistration = TestRegistration {
    name: "",
    body: unset_body,
    skip: false,
    sequence: 0,
    label: "",
    plan: None,
  };

  pub fn to_descriptor(&self) -> TestDescriptor {
    let descriptor = TestDescriptor::new(self.name, self.body)
      .with_skip(self.skip)
      .with_sequence(self.sequence)
      .with_label(self.label);
    match self.plan {
      Some(plan) => descriptor.with_plan(plan.to_plan()),
      None => descriptor,
    }
  }
}

inventory::collect!(TestRegistration);

/// Declares a test unit named after its module path and function.
///
/// ```ignore
/// fn reboot_survives(ctx: &mut RunContext) -> anyhow::Result<()> { Ok(()) }
/// testloop::test_unit!(reboot_survives, sequence = 3, label = "smoke:power");
/// ```
#[macro_export]
macro_rules! test_unit {
  ($body:ident $(, $field:ident = $value:expr)* $(,)?) => {
    $crate::inventory::submit! {
      $crate::registry::TestRegistration {
        name: concat!(module_path!(), "::", stringify!($body)),
        body: $body,
        $($field: $value,)*
        ..$crate::registry::TestRegistration::DEFAULT
      }
    }
  };
}

/// Result of scanning a namespace.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
  /// Matching descriptors in discovery order.
  pub descriptors: Vec<TestDescriptor>,
  /// Corpus-wide labels in order of first appearance.
  pub labels: Vec<String>,
}

/// Every known test unit, in discovery order, with name lookup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  descriptors: Vec<TestDescriptor>,
  index: HashMap<String, usize>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a registry from every [`TestRegistration`] linked into the
  /// binary. Discovery order is by fully-qualified name.
  pub fn from_inventory() -> Result<Self, DiscoveryError> {
    Self::from_registrations(inventory::iter::<TestRegistration>)
  }

  pub fn from_registrations<'a>(
    registrations: impl IntoIterator<Item = &'a TestRegistration>,
  ) -> Result<Self, DiscoveryError> {
    let mut registrations: Vec<&TestRegistration> = registrations.into_iter().collect();
    registrations.sort_by(|a, b| a.name.cmp(b.name));

    let mut registry = Self::new();
    for registration in registrations {
      registry.register(registration.to_descriptor())?;
    }
    Ok(registry)
  }

  pub fn register(&mut self, descriptor: TestDescriptor) -> Result<(), DiscoveryError> {
    if self.index.contains_key(descriptor.name()) {
      return Err(DiscoveryError::DuplicateTest(descriptor.name().to_string()));
    }
    self
      .index
      .insert(descriptor.name().to_string(), self.descriptors.len());
    self.descriptors.push(descriptor);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&TestDescriptor> {
    self.index.get(name).map(|&idx| &self.descriptors[idx])
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &TestDescriptor> {
    self.descriptors.iter()
  }

  /// Returns every descriptor at or below `namespace`. Finding nothing is
  /// not an error.
  pub fn scan(&self, namespace: &str) -> Result<Discovery, DiscoveryError> {
    validate_namespace(namespace)?;
    let descriptors: Vec<TestDescriptor> = self
      .descriptors
      .iter()
      .filter(|d| in_namespace(d.name(), namespace))
      .cloned()
      .collect();
    let labels = collect_labels(&descriptors);
    Ok(Discovery {
      descriptors,
      labels,
    })
  }
}

/// Folds every descriptor's labels into one de-duplicated list.
pub fn collect_labels(descriptors: &[TestDescriptor]) -> Vec<String> {
  let mut labels: Vec<String> = Vec::new();
  for descriptor in descriptors {
    for label in split_labels(descriptor.label()) {
      if !labels.contains(&label) {
        labels.push(label);
      }
    }
  }
  labels
}

fn validate_namespace(namespace: &str) -> Result<(), DiscoveryError> {
  let malformed = || DiscoveryError::MalformedNamespace(namespace.to_string());
  if namespace.is_empty() {
    return Err(malformed());
  }
  for segment in namespace.split("::") {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
      return Err(malformed());
    };
    if !(first == '_' || first.is_alphabetic()) {
      return Err(malformed());
    }
    if !chars.all(|c| c == '_' || c.is_alphanumeric()) {
      return Err(malformed());
    }
  }
  Ok(())
}

fn in_namespace(name: &str, namespace: &str) -> bool {
  match name.strip_prefix(namespace) {
    Some(rest) => rest.is_empty() || rest.starts_with("::"),
    None => false,
  }
}
