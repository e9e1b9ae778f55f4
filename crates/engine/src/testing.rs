//! Fixtures shared by the unit tests.

use jobset_core::{EntityId, FormData, Job, JobColor, Machine, Procedure};

pub fn machine(id: &str, title: &str) -> Machine {
    Machine {
        id: EntityId::from(id),
        title: title.to_string(),
        description: String::new(),
    }
}

pub fn procedure(job: &str, id: &str, machine: Option<&str>, processing_time_ms: i64) -> Procedure {
    Procedure {
        id: EntityId::from(id),
        job_id: EntityId::from(job),
        machine_id: machine.map(EntityId::from),
        processing_time_ms,
    }
}

pub fn color(color: &str) -> JobColor {
    JobColor {
        color: color.to_string(),
        text_color: "#ffffff".to_string(),
    }
}

/// Two machines and two jobs:
/// j1 runs p1 on m1 then p2 on m2, j2 runs p3 on m2.
pub fn sample_form() -> FormData {
    let mut form = FormData {
        title: "Workshop".into(),
        ..FormData::default()
    };
    form.machines.push(EntityId::from("m1"), machine("m1", "Lathe"));
    form.machines.push(EntityId::from("m2"), machine("m2", "Mill"));

    let mut j1 = Job::new(EntityId::from("j1"), "Shaft");
    j1.procedures
        .push(EntityId::from("p1"), procedure("j1", "p1", Some("m1"), 1_000));
    j1.procedures
        .push(EntityId::from("p2"), procedure("j1", "p2", Some("m2"), 2_000));
    let mut j2 = Job::new(EntityId::from("j2"), "Gear");
    j2.procedures
        .push(EntityId::from("p3"), procedure("j2", "p3", Some("m2"), 500));
    form.jobs.push(EntityId::from("j1"), j1);
    form.jobs.push(EntityId::from("j2"), j2);

    form.job_colors.push(EntityId::from("j1"), color("#1f77b4"));
    form.job_colors.push(EntityId::from("j2"), color("#ff7f0e"));
    form
}

pub fn add_machine(form: &mut FormData, id: &str) {
    form.machines.push(EntityId::from(id), machine(id, id));
}

/// Remove a machine and clear every procedure reference to it.
pub fn remove_machine(form: &mut FormData, id: &str) {
    let machine_id = EntityId::from(id);
    form.machines.remove(&machine_id);
    for job in form.jobs.entities.values_mut() {
        for procedure in job.procedures.entities.values_mut() {
            if procedure.machine_id.as_ref() == Some(&machine_id) {
                procedure.machine_id = None;
            }
        }
    }
}

const MACHINE_POOL: usize = 5;
const JOB_POOL: usize = 4;
const PROCEDURE_POOL: usize = 4;
const PALETTE: [&str; 3] = ["#1f77b4", "#ff7f0e", "#2ca02c"];

/// One job as drawn by [`arb_form`]: title, which procedure slots exist and
/// in what order, and per slot a machine pick and a processing time.
type RawJob = (String, Vec<usize>, Vec<(Option<usize>, i64)>);

fn arb_job() -> impl proptest::strategy::Strategy<Value = RawJob> {
    use proptest::prelude::*;

    (
        "[a-c]{1,2}",
        prop::sample::subsequence((0..PROCEDURE_POOL).collect::<Vec<_>>(), 0..=PROCEDURE_POOL)
            .prop_shuffle(),
        prop::collection::vec(
            (prop::option::of(0..MACHINE_POOL), 1i64..5_000),
            PROCEDURE_POOL,
        ),
    )
}

/// Valid snapshots drawn from fixed id pools, so two draws share some
/// entities and differ in order, membership, fields and references.
pub fn arb_form() -> impl proptest::strategy::Strategy<Value = FormData> {
    use proptest::prelude::*;

    (
        "[a-c]{0,2}",
        any::<bool>(),
        prop::sample::subsequence((0..MACHINE_POOL).collect::<Vec<_>>(), 0..=MACHINE_POOL)
            .prop_shuffle(),
        prop::collection::vec(("[a-c]{1,2}", "[a-c]{0,1}"), MACHINE_POOL),
        prop::sample::subsequence((0..JOB_POOL).collect::<Vec<_>>(), 0..=JOB_POOL).prop_shuffle(),
        prop::collection::vec(arb_job(), JOB_POOL),
        Just((0..JOB_POOL).collect::<Vec<_>>()).prop_shuffle(),
        prop::collection::vec(prop::option::of(0..PALETTE.len()), JOB_POOL),
    )
        .prop_map(
            |(title, is_auto, machine_slots, machine_fields, job_slots, jobs, color_order, colors)| {
                let mut form = FormData {
                    title,
                    is_auto_time_options: is_auto,
                    ..FormData::default()
                };
                for &slot in &machine_slots {
                    let id = format!("m{slot}");
                    let (title, description) = &machine_fields[slot];
                    let mut entry = machine(&id, title);
                    entry.description = description.clone();
                    form.machines.push(EntityId::from(id.as_str()), entry);
                }

                for &slot in &job_slots {
                    let job_id = format!("j{slot}");
                    let (title, procedure_slots, procedures) = &jobs[slot];
                    let mut job = Job::new(EntityId::from(job_id.as_str()), title.clone());
                    for &procedure_slot in procedure_slots {
                        let procedure_id = format!("{job_id}p{procedure_slot}");
                        let (pick, processing_time_ms) = procedures[procedure_slot];
                        let machine_id = pick
                            .filter(|_| !machine_slots.is_empty())
                            .map(|pick| format!("m{}", machine_slots[pick % machine_slots.len()]));
                        job.procedures.push(
                            EntityId::from(procedure_id.as_str()),
                            procedure(&job_id, &procedure_id, machine_id.as_deref(), processing_time_ms),
                        );
                    }
                    form.jobs.push(EntityId::from(job_id.as_str()), job);
                }

                for slot in color_order {
                    let job_id = EntityId::from(format!("j{slot}").as_str());
                    if let (true, Some(pick)) = (form.jobs.contains(&job_id), colors[slot]) {
                        form.job_colors.push(job_id, color(PALETTE[pick]));
                    }
                }
                form
            },
        )
}
