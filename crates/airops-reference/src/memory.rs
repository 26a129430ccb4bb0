//! Fixture-backed reference repository.
//!
//! Used by tests and the CLI harness. Builders return `self` so fixtures
//! read as one chained expression.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::records::{Aircraft, Airline, Airport, Stand, Terminal};
use crate::{ReferenceRepository, Result};

/// In-memory reference data.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReference {
    airports: HashMap<String, Airport>,
    airlines: HashMap<String, Airline>,
    aircraft: HashMap<String, Aircraft>,
    stands: HashMap<String, Stand>,
    terminals: HashMap<String, Terminal>,
    /// Extra `(kind, id)` pairs recognised by `entity_exists`, for kinds
    /// that have no dedicated table here (e.g. maintenance requests).
    extra_entities: HashSet<(String, String)>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_airport(mut self, airport: Airport) -> Self {
        self.airports.insert(airport.iata.clone(), airport);
        self
    }

    pub fn with_airline(mut self, airline: Airline) -> Self {
        self.airlines.insert(airline.iata.clone(), airline);
        self
    }

    pub fn with_aircraft(mut self, aircraft: Aircraft) -> Self {
        self.aircraft.insert(aircraft.iata.clone(), aircraft);
        self
    }

    pub fn with_stand(mut self, stand: Stand) -> Self {
        self.stands.insert(stand.name.to_uppercase(), stand);
        self
    }

    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        self.terminals.insert(terminal.id.to_uppercase(), terminal);
        self
    }

    pub fn with_entity(mut self, kind: &str, id: &str) -> Self {
        self.extra_entities
            .insert((kind.to_lowercase(), id.to_uppercase()));
        self
    }

    fn normalise_terminal(id: &str) -> String {
        let upper = id.trim().to_uppercase();
        if upper.starts_with('T') {
            upper
        } else {
            format!("T{}", upper)
        }
    }
}

#[async_trait]
impl ReferenceRepository for InMemoryReference {
    async fn airport_by_iata(&self, code: &str) -> Result<Option<Airport>> {
        Ok(self.airports.get(&code.to_uppercase()).cloned())
    }

    async fn airline_by_iata(&self, code: &str) -> Result<Option<Airline>> {
        Ok(self.airlines.get(&code.to_uppercase()).cloned())
    }

    async fn aircraft_type_by_iata(&self, code: &str) -> Result<Option<Aircraft>> {
        Ok(self.aircraft.get(&code.to_uppercase()).cloned())
    }

    async fn stand_by_name(&self, name: &str) -> Result<Option<Stand>> {
        Ok(self.stands.get(&name.to_uppercase()).cloned())
    }

    async fn terminal_exists(&self, id: &str) -> Result<bool> {
        Ok(self.terminals.contains_key(&Self::normalise_terminal(id)))
    }

    async fn stand_exists(&self, id: &str) -> Result<bool> {
        Ok(self.stands.contains_key(&id.to_uppercase()))
    }

    async fn entity_exists(&self, kind: &str, id: &str) -> Result<bool> {
        let kind = kind.to_lowercase();
        let id_upper = id.to_uppercase();
        let known = match kind.as_str() {
            "stand" => self.stands.contains_key(&id_upper),
            "terminal" => self.terminals.contains_key(&Self::normalise_terminal(id)),
            "airport" => self.airports.contains_key(&id_upper),
            "airline" => self.airlines.contains_key(&id_upper),
            _ => false,
        };
        Ok(known || self.extra_entities.contains(&(kind, id_upper)))
    }
}
