use stack::PLANS;

pub fn run_plans() {
    for plan in &PLANS {
        println!("{}", plan.description());
    }
}
