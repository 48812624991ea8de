//! Line-oriented [`Forms`] implementation for `appb run`.
//!
//! Every prompt accepts `:back`, `:restart` and `:quit`. End of input counts
//! as `:quit`. Lists are picked by 1-based number, comma separated.
use crate::session::{FieldRecord, OperationType};
use crate::workflow::fields as editor;
use crate::workflow::{
    ConnectionChoice, DefineAssetInput, DefineAssetView, EnrichInput, EnrichView, FormAction,
    Forms, Relationships, RelationshipsAction, RelationshipsView, SelectApplication,
    SelectApplicationView, Step,
};
use std::io::{BufRead, Write};

/// Navigation typed at a prompt instead of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Back,
    Restart,
    Quit,
}

type Answer<T> = Result<T, Interrupt>;

fn into_action<T>(answer: Answer<T>) -> FormAction<T> {
    match answer {
        Ok(value) => FormAction::Submit(value),
        Err(Interrupt::Back) => FormAction::GoBack,
        Err(Interrupt::Restart) => FormAction::StartOver,
        Err(Interrupt::Quit) => FormAction::Quit,
    }
}

/// Parse `"1, 3"` into zero-based indices below `len`. Blank input is an
/// empty selection; duplicates are kept once.
pub fn parse_indices(input: &str, len: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let number: usize = part
            .parse()
            .map_err(|_| format!("'{part}' is not a number"))?;
        if number == 0 || number > len {
            return Err(format!("{number} is out of range (1-{len})"));
        }
        if !indices.contains(&(number - 1)) {
            indices.push(number - 1);
        }
    }
    Ok(indices)
}

pub struct TerminalForms<R, W> {
    input: R,
    output: W,
}

impl TerminalForms<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalForms<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, text: &str) {
        // A closed terminal shows up as end of input on the next prompt.
        let _ = writeln!(self.output, "{text}");
    }

    fn ask(&mut self, prompt: &str) -> Answer<String> {
        let _ = write!(self.output, "{prompt}");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => return Err(Interrupt::Quit),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "failed to read input");
                return Err(Interrupt::Quit);
            }
        }
        match line.trim() {
            ":back" => Err(Interrupt::Back),
            ":restart" => Err(Interrupt::Restart),
            ":quit" | ":q" => Err(Interrupt::Quit),
            answer => Ok(answer.to_string()),
        }
    }

    fn ask_default(&mut self, label: &str, default: &str) -> Answer<String> {
        let prompt = if default.is_empty() {
            format!("{label}: ")
        } else {
            format!("{label} [{default}]: ")
        };
        let answer = self.ask(&prompt)?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn list<'l>(&mut self, labels: impl IntoIterator<Item = &'l str>) -> usize {
        let mut count = 0;
        for (index, label) in labels.into_iter().enumerate() {
            self.say(&format!("  {}) {label}", index + 1));
            count += 1;
        }
        count
    }

    /// Ask until the answer parses as a selection from `labels`.
    fn pick_many(&mut self, prompt: &str, labels: &[String]) -> Answer<Vec<String>> {
        loop {
            let answer = self.ask(prompt)?;
            match parse_indices(&answer, labels.len()) {
                Ok(indices) => return Ok(indices.into_iter().map(|i| labels[i].clone()).collect()),
                Err(message) => self.say(&message),
            }
        }
    }

    fn operation(&mut self) -> Answer<OperationType> {
        self.say(Step::ChooseOperation.title(None));
        self.list([OperationType::Create.label(), OperationType::Update.label()]);
        loop {
            match self.ask("> ")?.as_str() {
                "1" => return Ok(OperationType::Create),
                "2" => return Ok(OperationType::Update),
                _ => self.say("Enter 1 or 2."),
            }
        }
    }

    fn selection(&mut self, view: &SelectApplicationView<'_>) -> Answer<SelectApplication> {
        self.say(Step::SelectExistingApplication.title(Some(OperationType::Update)));
        let labels: Vec<String> = match view.results {
            Some(results) => results.labels().map(str::to_string).collect(),
            None => Vec::new(),
        };
        if view.results.is_some() && labels.is_empty() {
            self.say("  (no matches)");
        }
        self.list(labels.iter().map(String::as_str));
        let answer = self.ask(&format!(
            "Search applications (at least {} characters) or pick a number: ",
            view.min_search_chars
        ))?;
        if let Ok(number) = answer.parse::<usize>() {
            if (1..=labels.len()).contains(&number) {
                return Ok(SelectApplication::Pick(labels[number - 1].clone()));
            }
        }
        Ok(SelectApplication::Search(answer))
    }

    fn edit_field(&mut self, fields: &mut [FieldRecord], index: usize) -> Answer<()> {
        let Some(current) = fields.get(index).cloned() else {
            self.say("No such field.");
            return Ok(());
        };
        let name = self.ask_default("  Field name", &current.name)?;
        let field_type = self.ask_default("  Field type", &current.field_type)?;
        let description = self.ask_default("  Field description", &current.description)?;
        editor::edit(fields, index, &name, &field_type, &description);
        Ok(())
    }

    fn field_editor(&mut self, fields: &mut Vec<FieldRecord>) -> Answer<()> {
        loop {
            self.say("Application fields:");
            if fields.is_empty() {
                self.say("  (no fields)");
            }
            for (index, field) in fields.iter().enumerate() {
                let line = format!(
                    "  {}) {} [{}] {}",
                    index + 1,
                    field.name,
                    field.field_type,
                    field.description
                );
                self.say(line.trim_end());
            }
            let answer = self.ask("Fields: a=add, e N=edit, r N=remove, enter=done: ")?;
            let mut parts = answer.split_whitespace();
            let command = parts.next();
            let index = parts
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1));
            match (command, index) {
                (None, _) => return Ok(()),
                (Some("a"), _) => {
                    editor::add_blank(fields);
                    let last = fields.len() - 1;
                    self.edit_field(fields, last)?;
                }
                (Some("e"), Some(index)) => self.edit_field(fields, index)?,
                (Some("r"), Some(index)) => match editor::remove(fields, index) {
                    Some(removed) if removed.mark_for_deletion => self.say(&format!(
                        "Removed existing field '{}'; it will no longer be listed.",
                        removed.name
                    )),
                    Some(removed) => self.say(&format!("Removed field '{}'.", removed.name)),
                    None => self.say("No such field."),
                },
                _ => self.say("Unknown field command."),
            }
        }
    }

    fn connection(&mut self, view: &DefineAssetView<'_>) -> Answer<ConnectionChoice> {
        if view.operation.is_update() {
            let locked = view.locked_connection.map(str::to_string);
            self.say(&format!(
                "Connection: {} (cannot be changed)",
                locked.as_deref().unwrap_or("none")
            ));
            return Ok(ConnectionChoice::Existing(locked));
        }
        self.say("API connections:");
        let labels: Vec<String> = view.api_connections.iter().map(|c| c.label()).collect();
        let count = self.list(labels.iter().map(String::as_str));
        self.say("  n) Create a new connection");
        loop {
            let answer = self.ask("Connection: ")?;
            if answer == "n" {
                let name = self.ask("New connection name: ")?;
                return Ok(ConnectionChoice::New(name));
            }
            if answer.is_empty() {
                return Ok(ConnectionChoice::Existing(None));
            }
            match answer.parse::<usize>() {
                Ok(number) if (1..=count).contains(&number) => {
                    let chosen = &view.api_connections[number - 1];
                    return Ok(ConnectionChoice::Existing(Some(chosen.qualified_name.clone())));
                }
                _ => self.say("Pick a listed number or 'n'."),
            }
        }
    }

    fn definition(&mut self, view: &DefineAssetView<'_>) -> Answer<DefineAssetInput> {
        self.say(Step::DefineAsset.title(Some(view.operation)));
        if let Some(selected) = view.selected {
            self.say(&format!("Updating: {}", selected.qualified_name));
        }
        let mut fields = view.fields.to_vec();
        self.field_editor(&mut fields)?;
        let name = self.ask_default("Application name", view.default_name)?;
        let app_id = self.ask_default("App ID (optional)", view.default_app_id)?;
        let connection = self.connection(view)?;
        Ok(DefineAssetInput {
            fields,
            name,
            app_id,
            connection,
        })
    }

    fn enrichment(&mut self, view: &EnrichView<'_>) -> Answer<EnrichInput> {
        self.say(Step::Enrich.title(Some(view.operation)));
        self.say(&format!("Application: {}", view.application_name));
        let description = self.ask_default("Description", view.default_description)?;

        let owners: Vec<String> = view.owners.labels().map(str::to_string).collect();
        self.say("Owners:");
        self.list(owners.iter().map(String::as_str));
        let owners = self.pick_many("Owners (numbers, comma separated): ", &owners)?;

        let tags: Vec<String> = view.tags.labels().map(str::to_string).collect();
        self.say("Tags:");
        self.list(tags.iter().map(String::as_str));
        let tags = self.pick_many("Tags (numbers, comma separated): ", &tags)?;

        Ok(EnrichInput {
            description,
            owners,
            tags,
        })
    }

    fn links(&mut self, view: &RelationshipsView<'_>) -> Answer<RelationshipsAction> {
        self.say(Step::RelationshipsAndSubmit.title(Some(view.operation)));
        let labels: Vec<String> = view.search_results.labels().map(str::to_string).collect();
        self.list(labels.iter().map(String::as_str));
        let term = self.ask("Search assets (blank to pick relationships and submit): ")?;
        if !term.is_empty() {
            return Ok(RelationshipsAction::Search(term));
        }

        let owned = loop {
            let answer =
                self.ask("Owned assets (numbers; blank leaves unchanged, '-' clears): ")?;
            match answer.as_str() {
                "" => break None,
                "-" => break Some(Vec::new()),
                _ => match parse_indices(&answer, labels.len()) {
                    Ok(indices) => break Some(indices.into_iter().map(|i| labels[i].clone()).collect()),
                    Err(message) => self.say(&message),
                },
            }
        };
        let upstream = self.pick_many("Upstream assets (numbers): ", &labels)?;
        let downstream = self.pick_many("Downstream assets (numbers): ", &labels)?;
        Ok(RelationshipsAction::Submit(Relationships {
            owned_assets: owned,
            upstream,
            downstream,
        }))
    }
}

impl<R: BufRead, W: Write> Forms for TerminalForms<R, W> {
    fn choose_operation(&mut self) -> FormAction<OperationType> {
        into_action(self.operation())
    }

    fn select_application(
        &mut self,
        view: &SelectApplicationView<'_>,
    ) -> FormAction<SelectApplication> {
        into_action(self.selection(view))
    }

    fn define_asset(&mut self, view: &DefineAssetView<'_>) -> FormAction<DefineAssetInput> {
        into_action(self.definition(view))
    }

    fn enrich(&mut self, view: &EnrichView<'_>) -> FormAction<EnrichInput> {
        into_action(self.enrichment(view))
    }

    fn relationships(&mut self, view: &RelationshipsView<'_>) -> FormAction<RelationshipsAction> {
        into_action(self.links(view))
    }
}
