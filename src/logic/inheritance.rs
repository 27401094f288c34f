use std::collections::HashMap;

use crate::error::InheritanceError;
use crate::model::{FieldType, Id, PropertyDef, PropertyKind, Template, TITLE_PROPERTY};

/// What a (template, property) pair resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedProperty {
    Plain { field_type: FieldType },
    Vocabulary { thesaurus: Id, field_type: FieldType },
    Relationship { content: Option<Id> },
    Inheriting(Inheritance),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inheritance {
    pub relationship_property: String,
    /// Templates the linked entities may have that define the source property
    pub source_templates: Vec<Id>,
    pub source_property: String,
    /// Declared type of the source property itself
    pub source_type: FieldType,
    /// Type at the end of the inheritance chain, used for display and indexing
    pub effective_type: FieldType,
}

impl ResolvedProperty {
    /// Index/display type of the property
    pub fn effective_type(&self) -> FieldType {
        match self {
            ResolvedProperty::Plain { field_type } => *field_type,
            ResolvedProperty::Vocabulary { field_type, .. } => *field_type,
            ResolvedProperty::Relationship { .. } => FieldType::Relationship,
            ResolvedProperty::Inheriting(inheritance) => inheritance.effective_type,
        }
    }

    pub fn inheritance(&self) -> Option<&Inheritance> {
        match self {
            ResolvedProperty::Inheriting(inheritance) => Some(inheritance),
            _ => None,
        }
    }
}

/// A relationship property that must be recomputed when a source changes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependent {
    pub template: Id,
    pub property: String,
}

/// Read-only view over a snapshot of all templates answering inheritance
/// questions in both directions: what a property inherits, and who inherits
/// from a property.
#[derive(Debug, Clone, Default)]
pub struct InheritanceResolver {
    templates: Vec<Template>,
    by_id: HashMap<Id, usize>,
}

impl InheritanceResolver {
    pub fn new(templates: Vec<Template>) -> Self {
        let by_id = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self { templates, by_id }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, id: &Id) -> Option<&Template> {
        self.by_id.get(id).map(|&i| &self.templates[i])
    }

    /// Snapshot with `template` added or replaced
    pub fn with_template(&self, template: Template) -> Self {
        let mut templates = self.templates.clone();
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
        Self::new(templates)
    }

    pub fn resolve(
        &self,
        template_id: &Id,
        property: &str,
    ) -> Result<ResolvedProperty, InheritanceError> {
        let template = self
            .template(template_id)
            .ok_or_else(|| InheritanceError::UnknownTemplate(template_id.clone()))?;

        if property == TITLE_PROPERTY {
            return Ok(ResolvedProperty::Plain {
                field_type: FieldType::Text,
            });
        }

        let def = template
            .property(property)
            .ok_or_else(|| InheritanceError::UnknownProperty {
                template: template_id.clone(),
                property: property.to_string(),
            })?;

        match &def.kind {
            PropertyKind::Relationship {
                content,
                inherit: Some(inherit),
            } => {
                let candidates =
                    self.source_candidates(template, def, content.as_ref(), &inherit.property)?;

                let mut source_types: Vec<FieldType> = Vec::new();
                for candidate in &candidates {
                    let ty = source_type(candidate, &inherit.property);
                    if !source_types.contains(&ty) {
                        source_types.push(ty);
                    }
                }
                if source_types.len() > 1 {
                    return Err(InheritanceError::ConflictingSourceTypes {
                        template: template.id.clone(),
                        property: def.name.clone(),
                        types: source_types,
                    });
                }

                let effective_type = self.effective_type_of(template, def, &mut Vec::new())?;

                Ok(ResolvedProperty::Inheriting(Inheritance {
                    relationship_property: def.name.clone(),
                    source_templates: candidates.iter().map(|t| t.id.clone()).collect(),
                    source_property: inherit.property.clone(),
                    source_type: source_types[0],
                    effective_type,
                }))
            }
            PropertyKind::Relationship { content, .. } => Ok(ResolvedProperty::Relationship {
                content: content.clone(),
            }),
            PropertyKind::Select { content } | PropertyKind::Multiselect { content } => {
                Ok(ResolvedProperty::Vocabulary {
                    thesaurus: content.clone(),
                    field_type: def.field_type(),
                })
            }
            _ => Ok(ResolvedProperty::Plain {
                field_type: def.field_type(),
            }),
        }
    }

    /// Resolve every property of every template
    pub fn validate(&self) -> Result<(), InheritanceError> {
        for template in &self.templates {
            self.validate_template(&template.id)?;
        }
        Ok(())
    }

    pub fn validate_template(&self, template_id: &Id) -> Result<(), InheritanceError> {
        let template = self
            .template(template_id)
            .ok_or_else(|| InheritanceError::UnknownTemplate(template_id.clone()))?;
        for property in &template.properties {
            self.resolve(template_id, &property.name)?;
        }
        Ok(())
    }

    /// Relationship properties to recompute when `property` changes on an
    /// entity of `source_template`. A title change refreshes the label of
    /// every relationship pointing at the entity, inheriting or not.
    pub fn dependents_of(&self, source_template: Option<&Id>, property: &str) -> Vec<Dependent> {
        let mut dependents = Vec::new();
        for template in &self.templates {
            for def in &template.properties {
                if !def.accepts_template(source_template) {
                    continue;
                }
                let inherits_it = def.inherit().map_or(false, |i| i.property == property);
                if property == TITLE_PROPERTY || inherits_it {
                    dependents.push(Dependent {
                        template: template.id.clone(),
                        property: def.name.clone(),
                    });
                }
            }
        }
        dependents
    }

    /// Select/multiselect properties backed by `thesaurus`
    pub fn vocabulary_properties(&self, thesaurus: &Id) -> Vec<Dependent> {
        self.templates
            .iter()
            .flat_map(|template| {
                template
                    .properties
                    .iter()
                    .filter(|def| def.thesaurus() == Some(thesaurus))
                    .map(|def| Dependent {
                        template: template.id.clone(),
                        property: def.name.clone(),
                    })
            })
            .collect()
    }

    fn source_candidates<'a>(
        &'a self,
        template: &Template,
        def: &PropertyDef,
        content: Option<&Id>,
        source_property: &str,
    ) -> Result<Vec<&'a Template>, InheritanceError> {
        let defines = |t: &Template| source_property == TITLE_PROPERTY || t.property(source_property).is_some();

        let candidates: Vec<&Template> = match content {
            Some(target) => {
                let target_template = self
                    .template(target)
                    .ok_or_else(|| InheritanceError::UnknownTemplate(target.clone()))?;
                if defines(target_template) {
                    vec![target_template]
                } else {
                    Vec::new()
                }
            }
            None => self.templates.iter().filter(|&t| defines(t)).collect(),
        };

        if candidates.is_empty() {
            return Err(InheritanceError::MissingSourceProperty {
                template: template.id.clone(),
                property: def.name.clone(),
                source_property: source_property.to_string(),
            });
        }
        Ok(candidates)
    }

    /// Follow inheritance declarations until a non-inheriting property is
    /// reached. `path` holds the (template, property) pairs being resolved.
    fn effective_type_of(
        &self,
        template: &Template,
        def: &PropertyDef,
        path: &mut Vec<(Id, String)>,
    ) -> Result<FieldType, InheritanceError> {
        let key = (template.id.clone(), def.name.clone());
        if path.contains(&key) {
            path.push(key);
            return Err(InheritanceError::Cycle {
                path: path.iter().map(|(t, p)| format!("{}.{}", t, p)).collect(),
            });
        }

        let Some(inherit) = def.inherit() else {
            return Ok(def.field_type());
        };
        let content = match &def.kind {
            PropertyKind::Relationship { content, .. } => content.as_ref(),
            _ => None,
        };

        path.push(key);
        let candidates = self.source_candidates(template, def, content, &inherit.property)?;

        let mut types: Vec<FieldType> = Vec::new();
        for candidate in candidates {
            let ty = match candidate.property(&inherit.property) {
                Some(source_def) => self.effective_type_of(candidate, source_def, path)?,
                None => FieldType::Text,
            };
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        path.pop();

        if types.len() > 1 {
            return Err(InheritanceError::ConflictingSourceTypes {
                template: template.id.clone(),
                property: def.name.clone(),
                types,
            });
        }
        Ok(types[0])
    }
}

/// Declared type of `property` on `template`; the synthetic title is text
fn source_type(template: &Template, property: &str) -> FieldType {
    template
        .property(property)
        .map(PropertyDef::field_type)
        .unwrap_or(FieldType::Text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InheritDef, NewTemplate};

    fn template(id: &str, properties: Vec<PropertyDef>) -> Template {
        Template::from_new(
            NewTemplate {
                id: Some(id.to_string()),
                name: id.to_string(),
                properties,
            },
            "test".to_string(),
        )
    }

    fn inherit(name: &str, target: Option<&str>, property: &str) -> PropertyDef {
        PropertyDef::new(
            name,
            PropertyKind::Relationship {
                content: target.map(str::to_string),
                inherit: Some(InheritDef {
                    property: property.to_string(),
                }),
            },
        )
    }

    fn id(s: &str) -> Id {
        s.to_string()
    }

    #[test]
    fn test_resolves_plain_and_inheriting_properties() {
        let resolver = InheritanceResolver::new(vec![
            template("orders", vec![inherit("judge", Some("judges"), "born")]),
            template("judges", vec![PropertyDef::new("born", PropertyKind::Date)]),
        ]);

        assert_eq!(
            resolver.resolve(&id("judges"), "born").unwrap(),
            ResolvedProperty::Plain {
                field_type: FieldType::Date
            }
        );

        let resolved = resolver.resolve(&id("orders"), "judge").unwrap();
        let inheritance = resolved.inheritance().unwrap();
        assert_eq!(inheritance.source_templates, vec!["judges"]);
        assert_eq!(inheritance.source_property, "born");
        assert_eq!(inheritance.effective_type, FieldType::Date);
        assert_eq!(resolved.effective_type(), FieldType::Date);
    }

    #[test]
    fn test_effective_type_follows_chains() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("to_b", Some("b"), "to_c")]),
            template("b", vec![inherit("to_c", Some("c"), "amount")]),
            template("c", vec![PropertyDef::new("amount", PropertyKind::Numeric)]),
        ]);

        let resolved = resolver.resolve(&id("a"), "to_b").unwrap();
        let inheritance = resolved.inheritance().unwrap();
        assert_eq!(inheritance.source_type, FieldType::Relationship);
        assert_eq!(inheritance.effective_type, FieldType::Numeric);
    }

    #[test]
    fn test_title_and_untyped_targets() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("any", None, "title")]),
            template("b", vec![]),
            template("c", vec![]),
        ]);

        let resolved = resolver.resolve(&id("a"), "any").unwrap();
        let inheritance = resolved.inheritance().unwrap();
        assert_eq!(inheritance.effective_type, FieldType::Text);
        assert_eq!(inheritance.source_templates.len(), 3);
    }

    #[test]
    fn test_inheritance_cycle_is_reported() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("to_b", Some("b"), "to_a")]),
            template("b", vec![inherit("to_a", Some("a"), "to_b")]),
        ]);

        match resolver.resolve(&id("a"), "to_b") {
            Err(InheritanceError::Cycle { path }) => {
                assert_eq!(path, vec!["a.to_b", "b.to_a", "a.to_b"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(resolver.validate().is_err());
    }

    #[test]
    fn test_missing_source_property() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("to_b", Some("b"), "nope")]),
            template("b", vec![]),
        ]);

        assert!(matches!(
            resolver.resolve(&id("a"), "to_b"),
            Err(InheritanceError::MissingSourceProperty { .. })
        ));
        assert!(matches!(
            resolver.resolve(&id("a"), "unknown"),
            Err(InheritanceError::UnknownProperty { .. })
        ));
        assert!(matches!(
            resolver.resolve(&id("zzz"), "to_b"),
            Err(InheritanceError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_conflicting_source_types() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("any", None, "value")]),
            template("b", vec![PropertyDef::new("value", PropertyKind::Text)]),
            template("c", vec![PropertyDef::new("value", PropertyKind::Numeric)]),
        ]);

        assert!(matches!(
            resolver.resolve(&id("a"), "any"),
            Err(InheritanceError::ConflictingSourceTypes { .. })
        ));
    }

    #[test]
    fn test_dependents_of() {
        let resolver = InheritanceResolver::new(vec![
            template(
                "a",
                vec![
                    inherit("rel_text", Some("b"), "text"),
                    inherit("rel_other", Some("c"), "text"),
                    PropertyDef::new(
                        "plain_rel",
                        PropertyKind::Relationship {
                            content: Some(id("b")),
                            inherit: None,
                        },
                    ),
                ],
            ),
            template("b", vec![PropertyDef::new("text", PropertyKind::Text)]),
            template("c", vec![PropertyDef::new("text", PropertyKind::Text)]),
        ]);

        let b = id("b");
        let dependents = resolver.dependents_of(Some(&b), "text");
        assert_eq!(
            dependents,
            vec![Dependent {
                template: id("a"),
                property: id("rel_text")
            }]
        );

        let on_title: Vec<_> = resolver
            .dependents_of(Some(&b), TITLE_PROPERTY)
            .into_iter()
            .map(|d| d.property)
            .collect();
        assert_eq!(on_title, vec!["rel_text", "plain_rel"]);

        // A deleted source has no template: every candidate matches
        assert_eq!(resolver.dependents_of(None, "text").len(), 2);
    }

    #[test]
    fn test_with_template_replaces_definition() {
        let resolver = InheritanceResolver::new(vec![template("b", vec![])]);
        let updated = resolver.with_template(template(
            "b",
            vec![PropertyDef::new("text", PropertyKind::Text)],
        ));

        assert_eq!(updated.templates().len(), 1);
        assert!(updated.resolve(&id("b"), "text").is_ok());
        assert!(resolver.resolve(&id("b"), "text").is_err());
    }
}
