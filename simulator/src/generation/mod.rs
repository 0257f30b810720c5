use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::args::SimConfig;
use crate::plan::{Action, Interaction, Plan, SimValue};

pub(crate) const TABLE: &str = "sim_items";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Id,
    Label,
    Qty,
    Price,
    Note,
    Limit,
}

struct Template {
    sql: &'static str,
    params: &'static [Param],
    returns_rows: bool,
}

const TEMPLATES: &[Template] = &[
    Template {
        sql: "INSERT INTO sim_items (label, qty, price, note) VALUES (?, ?, ?, ?)",
        params: &[Param::Label, Param::Qty, Param::Price, Param::Note],
        returns_rows: false,
    },
    Template {
        sql: "SELECT id, label, qty, price, note FROM sim_items WHERE id = ?",
        params: &[Param::Id],
        returns_rows: true,
    },
    Template {
        sql: "SELECT id, label FROM sim_items WHERE label = ?",
        params: &[Param::Label],
        returns_rows: true,
    },
    Template {
        sql: "UPDATE sim_items SET qty = ? WHERE id = ?",
        params: &[Param::Qty, Param::Id],
        returns_rows: false,
    },
    Template {
        sql: "DELETE FROM sim_items WHERE id = ?",
        params: &[Param::Id],
        returns_rows: false,
    },
    Template {
        sql: "SELECT id, label, note FROM sim_items ORDER BY id LIMIT ?",
        params: &[Param::Limit],
        returns_rows: true,
    },
    Template {
        sql: "SELECT label, qty FROM sim_items ORDER BY qty DESC",
        params: &[],
        returns_rows: true,
    },
    Template {
        sql: "SELECT COUNT(*) FROM sim_items",
        params: &[],
        returns_rows: true,
    },
    Template {
        sql: "SHOW TABLES",
        params: &[],
        returns_rows: true,
    },
];

const LABELS: &[&str] = &[
    "alpha",
    "o'neil",
    r"back\slash",
    "what?",
    "  padded  ",
    "",
    "semi;colon",
    "12",
    "\"dq\"",
];

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    template: Option<usize>,
    /// A result set may still be open.
    open: bool,
}

struct GenState {
    rng: ChaCha8Rng,
    slots: Vec<SlotState>,
    autocommit: bool,
    inserted: i64,
}

pub(crate) fn generate_plan(config: &SimConfig, seed: u64) -> Result<Plan, String> {
    let steps = config.steps.max(1);
    let mut state = GenState {
        rng: ChaCha8Rng::seed_from_u64(seed),
        slots: vec![SlotState::default(); config.slots.max(1)],
        autocommit: true,
        inserted: 0,
    };

    let mut interactions = bootstrap_plan();
    state.inserted = 3;
    if let Some(property) = config.property {
        interactions.extend(property.build_plan().interactions);
    }
    if interactions.len() >= steps {
        interactions.truncate(steps);
        return Ok(Plan { interactions });
    }

    while interactions.len() < steps {
        let episode = next_episode(&mut state, config);
        interactions.extend(episode.into_iter().map(Interaction::new));
    }
    interactions.truncate(steps);
    Ok(Plan { interactions })
}

pub(crate) fn bootstrap_plan() -> Vec<Interaction> {
    let mut steps = vec![Interaction::new(Action::Do {
        sql: format!(
            "CREATE TABLE {TABLE} (id INT PRIMARY KEY AUTO_INCREMENT, label VARCHAR(24), \
             qty INT, price DOUBLE, note TEXT)"
        ),
        params: Vec::new(),
    })];
    for (label, qty) in [("alpha", 3), ("o'neil", 7), ("what?", 1)] {
        steps.push(Interaction::new(Action::Do {
            sql: format!("INSERT INTO {TABLE} (label, qty, price, note) VALUES (?, ?, ?, ?)"),
            params: vec![
                SimValue::Text(label.to_string()),
                SimValue::Int(qty),
                SimValue::Float(1.5),
                SimValue::Text(format!("seed note for {label}")),
            ],
        }));
    }
    steps
}

fn next_episode(state: &mut GenState, config: &SimConfig) -> Vec<Action> {
    let roll: f64 = state.rng.random();
    if state.autocommit && roll < config.kill_rate {
        return vec![Action::KillSessions];
    }
    if roll < config.kill_rate + 0.02 {
        return transaction_episode(state);
    }
    if roll < config.kill_rate + 0.02 + config.misuse_rate {
        return misuse_episode(state);
    }
    if roll < config.kill_rate + 0.02 + config.misuse_rate + 0.05 {
        state.inserted += 1;
        return vec![Action::Do {
            sql: format!("INSERT INTO {TABLE} (label, qty) VALUES (?, ?)"),
            params: vec![value_for(state, Param::Label), value_for(state, Param::Qty)],
        }];
    }
    statement_episode(state)
}

/// Prepare (if needed), bind, execute, and consume some of the result.
fn statement_episode(state: &mut GenState) -> Vec<Action> {
    let slot = state.rng.random_range(0..state.slots.len());
    let mut actions = Vec::new();

    let template_idx = match state.slots[slot].template {
        Some(idx) if state.rng.random::<f64>() < 0.8 => idx,
        _ => {
            let idx = state.rng.random_range(0..TEMPLATES.len());
            actions.push(Action::Prepare {
                slot,
                sql: TEMPLATES[idx].sql.to_string(),
            });
            state.slots[slot] = SlotState {
                template: Some(idx),
                open: false,
            };
            idx
        }
    };
    let template = &TEMPLATES[template_idx];

    for (i, param) in template.params.iter().enumerate() {
        // Sometimes keep the previous binding.
        if actions.is_empty() && state.rng.random::<f64>() < 0.2 {
            continue;
        }
        actions.push(Action::Bind {
            slot,
            position: i + 1,
            value: value_for(state, *param),
            declared: None,
        });
    }
    actions.push(Action::Execute { slot });
    if template_idx == 0 {
        state.inserted += 1;
    }

    if !template.returns_rows {
        state.slots[slot].open = false;
        return actions;
    }
    state.slots[slot].open = true;
    match state.rng.random_range(0..4) {
        0 => {
            actions.push(Action::FetchAll { slot });
            state.slots[slot].open = false;
        }
        1 => {
            // Leave the cursor open and interleave with other slots.
            actions.push(Action::Fetch { slot });
        }
        2 => {
            actions.push(Action::Fetch { slot });
            actions.push(Action::Finish { slot });
            state.slots[slot].open = false;
        }
        _ => {
            for _ in 0..state.rng.random_range(1..=4) {
                actions.push(Action::Fetch { slot });
            }
        }
    }
    if state.rng.random::<f64>() < 0.1 {
        actions.push(Action::Destroy { slot });
        state.slots[slot] = SlotState::default();
    }
    actions
}

fn transaction_episode(state: &mut GenState) -> Vec<Action> {
    if state.autocommit {
        state.autocommit = false;
        return vec![
            Action::Commit,
            Action::SetAutocommit { on: false },
            Action::Do {
                sql: format!("UPDATE {TABLE} SET price = ? WHERE id = ?"),
                params: vec![value_for(state, Param::Price), value_for(state, Param::Id)],
            },
        ];
    }
    state.autocommit = true;
    let finish = if state.rng.random::<bool>() {
        Action::Commit
    } else {
        Action::Rollback
    };
    vec![finish, Action::SetAutocommit { on: true }]
}

/// Calls both paths must reject the same way.
fn misuse_episode(state: &mut GenState) -> Vec<Action> {
    let slot = state.rng.random_range(0..state.slots.len());
    let Some(template_idx) = state.slots[slot].template else {
        return vec![Action::Execute { slot }];
    };
    let params = TEMPLATES[template_idx].params.len();
    match state.rng.random_range(0..4) {
        0 => vec![Action::Bind {
            slot,
            position: if state.rng.random::<bool>() { 0 } else { params + 1 },
            value: SimValue::Int(1),
            declared: None,
        }],
        1 => {
            state.slots[slot].open = false;
            vec![Action::Finish { slot }, Action::Finish { slot }]
        }
        2 if state.slots[slot].open => {
            state.slots[slot].open = false;
            vec![Action::Finish { slot }, Action::Fetch { slot }]
        }
        2 => vec![Action::Fetch { slot }, Action::Fetch { slot }],
        _ => {
            state.slots[slot].open = false;
            vec![
                Action::Prepare {
                    slot,
                    sql: TEMPLATES[template_idx].sql.to_string(),
                },
                Action::Fetch { slot },
            ]
        }
    }
}

fn value_for(state: &mut GenState, param: Param) -> SimValue {
    let rng = &mut state.rng;
    if param != Param::Id && param != Param::Limit && rng.random::<f64>() < 0.1 {
        return SimValue::Null;
    }
    match param {
        Param::Id => {
            let id = rng.random_range(1..=state.inserted.max(1) + 2);
            if rng.random::<f64>() < 0.2 {
                SimValue::Text(id.to_string())
            } else {
                SimValue::Int(id)
            }
        }
        Param::Label => SimValue::Text(LABELS[rng.random_range(0..LABELS.len())].to_string()),
        Param::Qty => match rng.random_range(0..6) {
            0 => SimValue::Text(format!("{}abc", rng.random_range(0..50))),
            1 => SimValue::Float(f64::from(rng.random_range(0..40)) / 4.0),
            _ => SimValue::Int(rng.random_range(-5..100)),
        },
        Param::Price => {
            if rng.random::<bool>() {
                SimValue::Float(f64::from(rng.random_range(-100..400)) / 8.0)
            } else {
                SimValue::Int(rng.random_range(0..50))
            }
        }
        Param::Note => {
            let len = if rng.random::<f64>() < 0.2 {
                rng.random_range(100..600)
            } else {
                rng.random_range(0..20)
            };
            let text: String = (0..len)
                .map(|i| {
                    let c = b"abc xyz'?\\;"[(i + len) % 11];
                    char::from(c)
                })
                .collect();
            if rng.random::<f64>() < 0.15 {
                SimValue::Blob(text.into_bytes())
            } else {
                SimValue::Text(text)
            }
        }
        Param::Limit => match rng.random_range(0..6) {
            0 => SimValue::Text(format!("{}; DROP TABLE {TABLE}", rng.random_range(0..4))),
            1 => SimValue::Text("abc".to_string()),
            _ => SimValue::Int(rng.random_range(0..5)),
        },
    }
}
