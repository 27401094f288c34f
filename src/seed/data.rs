use anyhow::Result;

use crate::logic::Engine;
use crate::model::{
    EntityInput, InheritDef, NewTemplate, PropertyDef, PropertyKind, Thesaurus, ThesaurusEntry,
    UserContext, UserValue,
};
use crate::store::traits::Store;

fn thesaurus(id: &str, name: &str, entries: &[(&str, &str)]) -> Thesaurus {
    Thesaurus {
        id: id.to_string(),
        name: name.to_string(),
        values: entries
            .iter()
            .map(|(id, label)| ThesaurusEntry {
                id: id.to_string(),
                label: label.to_string(),
            })
            .collect(),
    }
}

fn relationship(name: &str, target: &str, inherit: Option<&str>) -> PropertyDef {
    PropertyDef::new(
        name,
        PropertyKind::Relationship {
            content: Some(target.to_string()),
            inherit: inherit.map(|property| InheritDef {
                property: property.to_string(),
            }),
        },
    )
}

fn entity(
    shared_id: &str,
    language: &str,
    template: &str,
    title: &str,
    metadata: &[(&str, serde_json::Value)],
) -> EntityInput {
    let mut input = EntityInput::new(language);
    input.shared_id = Some(shared_id.to_string());
    input.template = Some(template.to_string());
    input.title = Some(title.to_string());
    for (property, value) in metadata {
        input
            .metadata
            .entry(property.to_string())
            .or_default()
            .push(UserValue::new(value.clone()));
    }
    input
}

/// Small court-records dataset: judges with a country and birth date, and
/// orders that inherit both through their `judge` relationships.
pub async fn load_seed_data<S: Store>(engine: &Engine<S>) -> Result<()> {
    let system = UserContext::system();

    engine
        .save_thesaurus(thesaurus(
            "countries",
            "Countries",
            &[("co", "Colombia"), ("ar", "Argentina"), ("cl", "Chile")],
        ))
        .await?;

    engine
        .save_template(
            NewTemplate {
                id: Some("judges".to_string()),
                name: "Judge".to_string(),
                properties: vec![
                    PropertyDef::new(
                        "country",
                        PropertyKind::Select {
                            content: "countries".to_string(),
                        },
                    ),
                    PropertyDef::new("born", PropertyKind::Date),
                    PropertyDef::new("biography", PropertyKind::Markdown),
                ],
            },
            &system.user_id,
        )
        .await?;

    engine
        .save_template(
            NewTemplate {
                id: Some("orders".to_string()),
                name: "Court order".to_string(),
                properties: vec![
                    relationship("judge_country", "judges", Some("country")),
                    relationship("judge_born", "judges", Some("born")),
                    relationship("judge", "judges", None),
                    PropertyDef::new("issued", PropertyKind::Date),
                ],
            },
            &system.user_id,
        )
        .await?;

    let documents = vec![
        entity(
            "judge-1",
            "en",
            "judges",
            "Judge Ana Pérez",
            &[("country", "co".into()), ("born", (-315_619_200).into())],
        ),
        entity(
            "judge-1",
            "es",
            "judges",
            "Jueza Ana Pérez",
            &[("country", "co".into()), ("born", (-315_619_200).into())],
        ),
        entity(
            "judge-2",
            "en",
            "judges",
            "Judge Luis Gómez",
            &[("country", "ar".into()), ("born", 31_536_000.into())],
        ),
        entity(
            "order-1",
            "en",
            "orders",
            "Provisional measures",
            &[
                ("judge_country", "judge-1".into()),
                ("judge_country", "judge-2".into()),
                ("judge_born", "judge-1".into()),
                ("judge", "judge-1".into()),
                ("issued", 1_676_688_700.into()),
            ],
        ),
        entity(
            "order-1",
            "es",
            "orders",
            "Medidas provisionales",
            &[
                ("judge_country", "judge-1".into()),
                ("judge_born", "judge-1".into()),
            ],
        ),
    ];

    for document in documents {
        let outcome = engine.save_entity(document).await?;
        for warning in &outcome.warnings {
            log::warn!("Seed {}: {}", outcome.saved.shared_id, warning);
        }
    }

    log::info!("Seed data loaded");
    Ok(())
}
