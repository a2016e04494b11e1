use anyhow::{Context, Result};
use casavoz_config::OpenAiSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "Eres un asistente de ventas inmobiliarias experto. Analiza la conversación \
entre el VENDEDOR y el CLIENTE para recomendar las MEJORES propiedades.\n\n\
FORMATO DE LA CONVERSACIÓN:\n\
- Las líneas con \"Vendedor:\" son del agente de ventas\n\
- Las líneas con \"Cliente:\" son del comprador potencial\n\
- Enfócate en lo que DICE EL CLIENTE: sus necesidades, presupuesto, ubicación deseada, \
número de recámaras, estilo de vida, etc.\n\n\
INSTRUCCIONES:\n\
1. Analiza qué busca el CLIENTE\n\
2. Selecciona las 3-5 propiedades MÁS relevantes de la lista\n\
3. Para cada propiedad, genera un PITCH DE VENTA personalizado\n\n\
Responde SOLO en JSON: {\"analisis\": \"...\", \"recomendaciones\": \
[{\"id\": 0, \"relevancia\": \"alta/media\", \"pitch\": \"...\"}]}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub location: String,
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: f64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// A property annotated with a generated sales pitch, forwarded verbatim to
/// the client.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub property: Property,
    pub pitch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevancia: Option<String>,
}

/// Search criteria extracted from the conversation for the no-AI fallback.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Criteria {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<u32>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub features: Vec<String>,
}

const LOCATIONS: &[&str] = &[
    "norte", "sur", "centro", "poniente", "oriente", "polanco", "condesa", "roma", "santa fe",
];

const AMENITIES: &[&str] = &[
    "alberca",
    "piscina",
    "gimnasio",
    "gym",
    "jardín",
    "jardin",
    "terraza",
    "estacionamiento",
];

/// Matches the property catalog against a rendered conversation transcript.
///
/// With an OpenAI key configured the whole transcript is analyzed by the
/// model, which selects properties and writes a per-property pitch; without
/// one (or on any AI failure) a keyword-criteria scorer over the catalog
/// takes over with a canned pitch.
pub struct PropertySearch {
    client: Client,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    catalog: Vec<Property>,
}

impl PropertySearch {
    pub fn new(openai: &OpenAiSettings, catalog: Vec<Property>) -> Self {
        Self {
            client: Client::new(),
            api_key: openai.api_key.clone(),
            model: openai.model.clone(),
            max_tokens: openai.search_max_tokens,
            catalog,
        }
    }

    /// Loads the mock catalog from disk.
    pub fn load(openai: &OpenAiSettings, catalog_path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(catalog_path)
            .with_context(|| format!("failed to read property catalog {}", catalog_path))?;
        let catalog: Vec<Property> =
            serde_json::from_str(&raw).context("invalid property catalog")?;
        info!(count = catalog.len(), "property catalog loaded");
        Ok(Self::new(openai, catalog))
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_ai_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns a ranked list of recommendations. Never fails: AI errors
    /// degrade to the criteria scorer.
    pub async fn search(&self, transcript: &str) -> Vec<Recommendation> {
        if self.api_key.is_some() && transcript.len() > 20 {
            match self.ai_search(transcript).await {
                Ok(recs) if !recs.is_empty() => return recs,
                Ok(_) => debug!("AI returned no recommendations, using criteria fallback"),
                Err(e) => warn!(%e, "AI property search failed, using criteria fallback"),
            }
        }

        self.fallback_search(transcript)
    }

    async fn ai_search(&self, transcript: &str) -> Result<Vec<Recommendation>> {
        let api_key = self.api_key.as_ref().context("no API key")?;

        let props_for_ai: Vec<serde_json::Value> = self
            .catalog
            .iter()
            .enumerate()
            .map(|(i, p)| {
                serde_json::json!({
                    "id": i,
                    "nombre": p.name,
                    "ubicacion": p.location,
                    "precio": p.price,
                    "recamaras": p.bedrooms,
                    "banos": p.bathrooms,
                    "area": p.area,
                    "tipo": p.kind,
                    "amenidades": p.amenities.join(", "),
                })
            })
            .collect();

        let user_content = format!(
            "CONVERSACIÓN DEL CLIENTE:\n{}\n\nPROPIEDADES DISPONIBLES:\n{}",
            transcript,
            serde_json::to_string_pretty(&props_for_ai)?,
        );

        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_content},
            ],
            "temperature": 0.7,
            "max_tokens": self.max_tokens,
        });

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct AiSearch {
            #[serde(default)]
            recomendaciones: Vec<AiPick>,
        }
        #[derive(Deserialize)]
        struct AiPick {
            id: usize,
            #[serde(default)]
            relevancia: Option<String>,
            pitch: String,
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .context("empty choices in AI response")?;
        let cleaned = content.replace("```json", "").replace("```", "");
        let picks: AiSearch =
            serde_json::from_str(cleaned.trim()).context("unparsable AI search response")?;

        Ok(picks
            .recomendaciones
            .into_iter()
            .filter_map(|pick| {
                self.catalog.get(pick.id).map(|property| Recommendation {
                    property: property.clone(),
                    pitch: pick.pitch,
                    relevancia: pick.relevancia,
                })
            })
            .collect())
    }

    /// Criteria scorer over the catalog, with a canned pitch.
    fn fallback_search(&self, transcript: &str) -> Vec<Recommendation> {
        let criteria = extract_criteria(transcript);
        debug!(?criteria, "criteria fallback search");

        self.score(&criteria)
            .into_iter()
            .take(5)
            .map(|property| Recommendation {
                pitch: format!(
                    "Propiedad destacada en {}. {} recámaras, {} baños.",
                    property.location, property.bedrooms, property.bathrooms
                ),
                property: property.clone(),
                relevancia: None,
            })
            .collect()
    }

    /// Scores every property against the criteria; returns them best-first.
    /// When nothing matches at all, the first catalog entries stand in as
    /// featured properties.
    fn score(&self, criteria: &Criteria) -> Vec<&Property> {
        let mut scored: Vec<(&Property, u32)> = self
            .catalog
            .iter()
            .map(|p| (p, score_property(p, criteria)))
            .collect();

        if scored.iter().all(|&(_, s)| s == 0) {
            return self.catalog.iter().take(5).collect();
        }

        scored.retain(|&(_, s)| s > 0);
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(p, _)| p).collect()
    }
}

fn score_property(property: &Property, criteria: &Criteria) -> u32 {
    let mut score = 0;

    if let Some(max_price) = criteria.max_price {
        if property.price <= max_price {
            score += 20;
        }
    }
    if let Some(min_price) = criteria.min_price {
        if property.price >= min_price * 0.5 {
            score += 10;
        }
    }
    if let Some(min_bedrooms) = criteria.min_bedrooms {
        if property.bedrooms >= min_bedrooms {
            score += 25;
        }
    }
    if let Some(min_bathrooms) = criteria.min_bathrooms {
        if property.bathrooms >= min_bathrooms {
            score += 10;
        }
    }
    if let Some(ref location) = criteria.location {
        if property.location.to_lowercase().contains(location.as_str()) {
            score += 30;
        }
    }
    if let Some(ref kind) = criteria.property_type {
        let prop_kind = property.kind.to_lowercase();
        if prop_kind.contains(kind.as_str()) || kind.contains(prop_kind.as_str()) {
            score += 15;
        }
    }
    for feature in &criteria.features {
        if property
            .amenities
            .iter()
            .any(|a| a.to_lowercase().contains(feature.as_str()))
        {
            score += 5;
        }
    }

    score
}

/// Keyword extraction over the lowercased transcript. Numbers are read from
/// adjacent word pairs ("3 millones", "2 baños"), so no pattern engine is
/// needed for the fallback path.
pub(crate) fn extract_criteria(transcript: &str) -> Criteria {
    let lower = transcript.to_lowercase();
    let mut criteria = Criteria::default();

    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != ',' && c != '.'))
        .collect();

    for pair in words.windows(2) {
        let Ok(number) = pair[0].replace(',', "").parse::<f64>() else {
            continue;
        };
        let unit = pair[1];

        if unit.starts_with("millon") || unit.starts_with("millón") {
            let price = number * 1_000_000.0;
            criteria.min_price = Some(price * 0.8);
            criteria.max_price = Some(price * 1.2);
        } else if unit == "mil" {
            let price = number * 1_000.0;
            criteria.min_price = Some(price * 0.8);
            criteria.max_price = Some(price * 1.2);
        } else if unit.starts_with("recámara")
            || unit.starts_with("recamara")
            || unit.starts_with("habitacion")
            || unit.starts_with("habitación")
            || unit.starts_with("cuarto")
        {
            criteria.min_bedrooms = Some(number as u32);
        } else if unit.starts_with("baño") || unit.starts_with("bano") {
            criteria.min_bathrooms = Some(number as u32);
        }
    }

    criteria.location = LOCATIONS
        .iter()
        .find(|loc| lower.contains(**loc))
        .map(|loc| loc.to_string());

    if lower.contains("casa") {
        criteria.property_type = Some("casa".to_string());
    } else if lower.contains("departamento") || lower.contains("depa") {
        criteria.property_type = Some("departamento".to_string());
    }

    criteria.features = AMENITIES
        .iter()
        .filter(|a| lower.contains(**a))
        .map(|a| a.to_string())
        .collect();

    criteria
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_settings() -> OpenAiSettings {
        OpenAiSettings {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            search_max_tokens: 1500,
        }
    }

    fn catalog() -> Vec<Property> {
        vec![
            Property {
                name: "Residencial Los Pinos".to_string(),
                location: "Zona Norte, Monterrey".to_string(),
                price: 2_800_000.0,
                bedrooms: 3,
                bathrooms: 2,
                area: 180.0,
                kind: "Casa".to_string(),
                amenities: vec!["Jardín".to_string(), "Estacionamiento".to_string()],
            },
            Property {
                name: "Torre Vista Sur".to_string(),
                location: "Zona Sur, Monterrey".to_string(),
                price: 5_500_000.0,
                bedrooms: 2,
                bathrooms: 1,
                area: 95.0,
                kind: "Departamento".to_string(),
                amenities: vec!["Alberca".to_string(), "Gimnasio".to_string()],
            },
            Property {
                name: "Casa Centro Histórico".to_string(),
                location: "Centro, Monterrey".to_string(),
                price: 1_900_000.0,
                bedrooms: 2,
                bathrooms: 1,
                area: 120.0,
                kind: "Casa".to_string(),
                amenities: vec![],
            },
        ]
    }

    #[test]
    fn extracts_price_bedrooms_and_location() {
        let criteria = extract_criteria(
            "Mi presupuesto es de 3 millones de pesos, busco casa con 3 recámaras y 2 baños en zona norte con jardín",
        );
        assert_eq!(criteria.min_price, Some(2_400_000.0));
        assert_eq!(criteria.max_price, Some(3_600_000.0));
        assert_eq!(criteria.min_bedrooms, Some(3));
        assert_eq!(criteria.min_bathrooms, Some(2));
        assert_eq!(criteria.location.as_deref(), Some("norte"));
        assert_eq!(criteria.property_type.as_deref(), Some("casa"));
        assert_eq!(criteria.features, vec!["jardín".to_string()]);
    }

    #[test]
    fn extracts_thousands() {
        let criteria = extract_criteria("algo de 900 mil pesos");
        assert_eq!(criteria.min_price, Some(720_000.0));
        assert_eq!(criteria.max_price, Some(1_080_000.0));
    }

    #[test]
    fn empty_transcript_yields_empty_criteria() {
        assert_eq!(extract_criteria(""), Criteria::default());
    }

    #[tokio::test]
    async fn fallback_ranks_matching_property_first() {
        let search = PropertySearch::new(&openai_settings(), catalog());
        let recs = search
            .search("busco casa con 3 recámaras en zona norte, presupuesto 3 millones")
            .await;

        assert!(!recs.is_empty());
        assert_eq!(recs[0].property.name, "Residencial Los Pinos");
        assert!(recs[0].pitch.contains("Zona Norte"));
    }

    #[tokio::test]
    async fn no_matches_falls_back_to_featured() {
        let search = PropertySearch::new(&openai_settings(), catalog());
        let recs = search.search("").await;

        // nothing matched: the first catalog entries stand in
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].property.name, "Residencial Los Pinos");
        assert!(recs.iter().all(|r| !r.pitch.is_empty()));
    }
}
