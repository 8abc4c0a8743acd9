//! Prompt text for each artifact. Prompts are Swedish, as are the answers.

use crate::generator::{ActivityInput, CheckInSummary, HealthPlanInput, RecipeInput};
use std::fmt::Write;

pub(crate) fn health_plan(input: &HealthPlanInput) -> String {
    let user = &input.user;
    let mut prompt = format!(
        "Du är en hälsocoach. Skriv en personlig hälsoplan på svenska för {}.\n\n\
         Ålder: {}\nVikt: {} kg\nMålvikt: {} kg\nLängd: {} cm\nMål: {}\nLivsstil: {}\n",
        user.name,
        user.age,
        user.current_weight,
        user.target_weight,
        user.height,
        user.goals.join(", "),
        user.lifestyle.join(", "),
    );
    if let Some(partner) = &input.partner {
        let _ = write!(
            prompt,
            "\nPartner: {}\nPartnerns mål: {}\nPartnerns livsstil: {}\n\
             Planen ska gå att följa tillsammans.\n",
            partner.name,
            partner.goals.join(", "),
            partner.lifestyle.join(", "),
        );
    }
    prompt.push_str(
        "\nTa med strategi, kost, träning, vanor och ett veckoschema. \
         Håll en positiv ton och fokusera på hållbara förändringar.",
    );
    prompt
}

const RECIPE_FORMAT: &str = r#"Svara endast med JSON i formatet:
{"title": "...", "description": "...", "ingredients": ["..."], "instructions": ["..."], "cookingTime": "X min", "servings": "X"}"#;

pub(crate) fn recipe(input: &RecipeInput) -> String {
    match input {
        RecipeInput::FromPreferences(list) => format!(
            "Skapa ett hälsosamt recept på svenska.\n\
             Gillar: {}\nUndviker helt: {}\nÄter ibland: {}\n\
             Högst 45 minuter, 2-4 portioner.\n\n{RECIPE_FORMAT}",
            list.yes.join(", "),
            list.no.join(", "),
            list.sometimes.join(", "),
        ),
        RecipeInput::FromLink(url) => format!(
            "Strukturera receptet på denna länk på svenska: {url}\n\
             Om länken inte går att läsa, skapa ett hälsosamt recept utifrån adressen.\n\n\
             {RECIPE_FORMAT}"
        ),
    }
}

pub(crate) fn activity_suggestions(input: &ActivityInput) -> String {
    format!(
        "Föreslå 5 varierade aktiviteter på svenska för {} ({} år).\n\
         Mål: {}\nLivsstil: {}\nUndvik: {}\n\n\
         Svara endast med en JSON-lista:\n\
         [{{\"name\": \"...\", \"description\": \"...\", \"duration\": \"X min\", \
         \"difficulty\": \"Lätt|Medel|Svår\", \
         \"category\": \"Kondition|Styrka|Flexibilitet|Balans|Mental hälsa|Utomhus|Grupp\"}}]",
        input.user.name,
        input.user.age,
        input.user.goals.join(", "),
        input.user.lifestyle.join(", "),
        input.existing.join(", "),
    )
}

pub(crate) fn motivational_message(input: &CheckInSummary) -> String {
    format!(
        "Ge en kort, uppmuntrande kommentar på svenska (högst 100 ord) till dagens incheckning.\n\
         Humör: {}/10\nEnergi: {}/10\nAnteckningar: {}",
        input.mood, input.energy, input.notes,
    )
}

// System messages for chat-style APIs.

pub(crate) const COACH_SYSTEM: &str =
    "Du är en professionell hälsocoach som skapar personliga, motiverande hälsoplaner på svenska.";

pub(crate) const CHEF_SYSTEM: &str =
    "Du är en kockexpert som skapar hälsosamma recept baserat på matpreferenser.";

pub(crate) const ENCOURAGING_SYSTEM: &str =
    "Du är en varm, uppmuntrande hälsocoach som ger korta, personliga motiverande meddelanden på svenska.";
