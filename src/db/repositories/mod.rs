mod steps;
mod templates;
