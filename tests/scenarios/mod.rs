mod end_to_end;
mod evaluation_gate;
mod leakage;
mod promotion_gate;
mod serving_api;
mod split;
mod validation_gate;
