use jobset_core::{EntityId, FormData, Job, JobColor, Machine, Procedure};

fn machine(id: &str, title: &str) -> Machine {
    Machine {
        id: EntityId::from(id),
        title: title.to_string(),
        description: String::new(),
    }
}

fn procedure(job: &str, id: &str, machine: &str, processing_time_ms: i64) -> Procedure {
    Procedure {
        id: EntityId::from(id),
        job_id: EntityId::from(job),
        machine_id: Some(EntityId::from(machine)),
        processing_time_ms,
    }
}

fn color(color: &str) -> JobColor {
    JobColor {
        color: color.to_string(),
        text_color: "#ffffff".to_string(),
    }
}

/// Two machines (`m1` Lathe, `m2` Mill) and two jobs: `j1` Shaft runs `p1`
/// on m1 then `p2` on m2, `j2` Gear runs `p3` on m2.
pub fn workshop_form() -> FormData {
    let mut form = FormData {
        title: "Workshop".to_string(),
        ..FormData::default()
    };
    for m in [machine("m1", "Lathe"), machine("m2", "Mill")] {
        form.machines.push(m.id.clone(), m);
    }

    let mut shaft = Job::new(EntityId::from("j1"), "Shaft");
    for p in [procedure("j1", "p1", "m1", 1_000), procedure("j1", "p2", "m2", 2_000)] {
        shaft.procedures.push(p.id.clone(), p);
    }
    let mut gear = Job::new(EntityId::from("j2"), "Gear");
    let p3 = procedure("j2", "p3", "m2", 500);
    gear.procedures.push(p3.id.clone(), p3);

    form.jobs.push(shaft.id.clone(), shaft);
    form.jobs.push(gear.id.clone(), gear);
    form.job_colors.push(EntityId::from("j1"), color("#1f77b4"));
    form.job_colors.push(EntityId::from("j2"), color("#ff7f0e"));
    form
}

pub fn machine_titles(form: &FormData) -> Vec<String> {
    form.machines
        .iter()
        .map(|(_, machine)| machine.title.clone())
        .collect()
}

pub fn job_titles(form: &FormData) -> Vec<String> {
    form.jobs.iter().map(|(_, job)| job.title.clone()).collect()
}
