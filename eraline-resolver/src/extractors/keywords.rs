//! Curated keyword tables
//!
//! Only specific events, people, places and named eras. Plain era words,
//! professions and vehicle/technology nouns are left out. Surnames, modern
//! cities and words with an everyday meaning appear only inside a longer
//! phrase ("battle of midway", "president kennedy").

use crate::models::Genre;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

/// Keyword priority: lower wins
pub const PRIORITY_BATTLE: u8 = 1;
pub const PRIORITY_DEFAULT: u8 = 2;

const WAR_OR_HISTORY: &[Genre] = &[Genre::War, Genre::History];

/// One curated keyword
#[derive(Debug, Clone, Copy)]
pub struct KeywordEntry {
    pub key: &'static str,
    pub year: i32,
    pub priority: u8,
    /// Only fires when the subject carries one of these genres
    pub genre_gate: Option<&'static [Genre]>,
}

const fn kw(key: &'static str, year: i32) -> KeywordEntry {
    KeywordEntry {
        key,
        year,
        priority: PRIORITY_DEFAULT,
        genre_gate: None,
    }
}

const fn battle(key: &'static str, year: i32) -> KeywordEntry {
    KeywordEntry {
        key,
        year,
        priority: PRIORITY_BATTLE,
        genre_gate: None,
    }
}

const fn gated(key: &'static str, year: i32, genres: &'static [Genre]) -> KeywordEntry {
    KeywordEntry {
        key,
        year,
        priority: PRIORITY_DEFAULT,
        genre_gate: Some(genres),
    }
}

/// Keywords consulted against title + synopsis
pub const PERIOD_KEYWORDS: &[KeywordEntry] = &[
    // Antiquity
    kw("cleopatra", -30),
    kw("julius caesar", -44),
    kw("alexander the great", -323),
    kw("spartacus", -71),
    kw("pompeii", 79),
    // Middle ages
    kw("joan of arc", 1429),
    kw("ジャンヌ・ダルク", 1429),
    kw("black death", 1348),
    kw("magna carta", 1215),
    // Renaissance
    kw("leonardo da vinci", 1500),
    kw("galileo galilei", 1610),
    // Japanese eras
    kw("戦国時代", 1550),
    kw("江戸時代", 1700),
    kw("明治時代", 1890),
    kw("大正時代", 1920),
    kw("昭和時代", 1950),
    kw("平成時代", 2000),
    kw("本能寺", 1582),
    kw("関ヶ原", 1600),
    kw("sekigahara", 1600),
    kw("幕末", 1865),
    kw("bakumatsu", 1865),
    kw("明治維新", 1868),
    kw("meiji restoration", 1868),
    // European dynastic eras
    kw("elizabethan", 1580),
    kw("victorian era", 1860),
    kw("victorian england", 1860),
    kw("victorian london", 1860),
    kw("ヴィクトリア朝", 1860),
    kw("regency era", 1815),
    kw("georgian era", 1750),
    kw("belle epoque", 1900),
    kw("belle époque", 1900),
    // Exploration
    kw("christopher columbus", 1492),
    kw("コロンブス", 1492),
    kw("ferdinand magellan", 1520),
    // American history
    kw("mayflower", 1620),
    kw("american revolution", 1776),
    kw("revolutionary war", 1776),
    kw("declaration of independence", 1776),
    kw("アメリカ独立", 1776),
    kw("battle of gettysburg", 1863),
    kw("gettysburg address", 1863),
    kw("ゲティスバーグの戦い", 1863),
    kw("abraham lincoln", 1863),
    kw("リンカーン大統領", 1863),
    kw("gold rush", 1849),
    kw("ok corral", 1881),
    kw("billy the kid", 1881),
    kw("jesse james", 1882),
    gated("american civil war", 1863, WAR_OR_HISTORY),
    gated("civil war", 1863, WAR_OR_HISTORY),
    gated("南北戦争", 1863, WAR_OR_HISTORY),
    // First world war
    battle("battle of verdun", 1916),
    battle("battle of the somme", 1916),
    battle("gallipoli", 1915),
    battle("ガリポリ", 1915),
    kw("treaty of versailles", 1919),
    kw("ヴェルサイユ条約", 1919),
    kw("red baron", 1917),
    kw("レッド・バロン", 1917),
    // Interwar
    kw("al capone", 1930),
    kw("アル・カポネ", 1930),
    kw("great depression", 1933),
    kw("大恐慌", 1933),
    kw("wall street crash", 1929),
    kw("dust bowl", 1935),
    kw("weimar republic", 1925),
    kw("ワイマール共和国", 1925),
    kw("russian revolution", 1917),
    kw("ロシア革命", 1917),
    kw("vladimir lenin", 1920),
    kw("レーニン", 1920),
    kw("joseph stalin", 1935),
    kw("スターリン", 1935),
    // Second world war
    kw("adolf hitler", 1940),
    kw("ヒトラー", 1940),
    kw("holocaust", 1942),
    kw("ホロコースト", 1942),
    kw("auschwitz", 1943),
    kw("アウシュヴィッツ", 1943),
    kw("anne frank", 1944),
    kw("アンネ・フランク", 1944),
    battle("dunkirk", 1940),
    battle("ダンケルク", 1940),
    kw("battle of britain", 1940),
    battle("stalingrad", 1942),
    battle("スターリングラード", 1942),
    battle("el alamein", 1942),
    battle("d-day", 1944),
    battle("ノルマンディー上陸", 1944),
    battle("normandy landings", 1944),
    battle("normandy invasion", 1944),
    battle("オマハ・ビーチ", 1944),
    battle("omaha beach", 1944),
    battle("battle of the bulge", 1944),
    battle("バルジの戦い", 1944),
    battle("iwo jima", 1945),
    battle("硫黄島", 1945),
    battle("battle of okinawa", 1945),
    battle("沖縄戦", 1945),
    battle("pearl harbor", 1941),
    battle("真珠湾", 1941),
    kw("パールハーバー", 1941),
    battle("battle of midway", 1942),
    battle("ミッドウェー海戦", 1942),
    battle("bombing of hiroshima", 1945),
    battle("bombing of nagasaki", 1945),
    kw("atomic bomb", 1945),
    kw("原爆", 1945),
    kw("v-e day", 1945),
    kw("v-j day", 1945),
    kw("winston churchill", 1940),
    kw("チャーチル", 1940),
    kw("franklin roosevelt", 1942),
    kw("ルーズベルト", 1942),
    kw("general eisenhower", 1944),
    kw("general patton", 1944),
    kw("パットン", 1944),
    kw("rommel", 1942),
    kw("ロンメル", 1942),
    kw("gestapo", 1940),
    kw("ゲシュタポ", 1940),
    kw("vichy france", 1942),
    kw("ヴィシー政権", 1942),
    kw("de gaulle", 1944),
    kw("ドゴール", 1944),
    battle("anzio", 1944),
    battle("アンツィオ", 1944),
    battle("monte cassino", 1944),
    battle("モンテ・カッシーノ", 1944),
    // Cold war
    kw("berlin wall", 1970),
    kw("ベルリンの壁", 1970),
    kw("cuban missile crisis", 1962),
    kw("キューバ危機", 1962),
    kw("bay of pigs", 1961),
    kw("korean war", 1951),
    kw("朝鮮戦争", 1951),
    kw("vietnam war", 1968),
    kw("ベトナム戦争", 1968),
    kw("tet offensive", 1968),
    kw("mccarthyism", 1953),
    kw("joseph mccarthy", 1953),
    kw("マッカーシズム", 1953),
    kw("sputnik", 1957),
    kw("スプートニク", 1957),
    kw("yuri gagarin", 1961),
    kw("ガガーリン", 1961),
    // 1950s-60s
    kw("elvis presley", 1956),
    kw("beatles", 1964),
    kw("ビートルズ", 1964),
    kw("martin luther king", 1963),
    kw("キング牧師", 1963),
    kw("president kennedy", 1963),
    kw("ケネディ大統領", 1963),
    kw("kennedy assassination", 1963),
    kw("apollo 11", 1969),
    kw("アポロ11号", 1969),
    kw("moon landing", 1969),
    kw("月面着陸", 1969),
    kw("neil armstrong", 1969),
    kw("woodstock festival", 1969),
    kw("summer of love", 1967),
    kw("サマー・オブ・ラブ", 1967),
    kw("paris 68", 1968),
    kw("パリ68年", 1968),
    kw("may 1968", 1968),
    kw("五月革命", 1968),
    // 1970s-80s
    kw("watergate", 1974),
    kw("ウォーターゲート", 1974),
    kw("president nixon", 1972),
    kw("richard nixon", 1972),
    kw("ニクソン大統領", 1972),
    kw("oil crisis", 1973),
    kw("石油危機", 1973),
    kw("iranian revolution", 1979),
    kw("イラン革命", 1979),
    kw("khomeini", 1979),
    kw("ホメイニ", 1979),
    kw("ronald reagan", 1985),
    kw("レーガン", 1985),
    kw("margaret thatcher", 1985),
    kw("サッチャー", 1985),
    kw("マンデラ", 1990),
    kw("nelson mandela", 1990),
    // Japan, postwar
    kw("バブル経済", 1989),
    kw("bubble economy", 1989),
    kw("安保闘争", 1960),
    kw("全共闘", 1968),
    // 1990s onward
    kw("fall of berlin wall", 1989),
    kw("ベルリンの壁崩壊", 1989),
    kw("gulf war", 1991),
    kw("湾岸戦争", 1991),
    kw("9/11", 2001),
    kw("september 11", 2001),
    kw("同時多発テロ", 2001),
    kw("iraq war", 2005),
    kw("イラク戦争", 2005),
    kw("afghanistan war", 2005),
    kw("アフガニスタン戦争", 2005),
    kw("bin laden", 2011),
    kw("ビンラディン", 2011),
    kw("osama bin laden", 2011),
    kw("abbottabad", 2011),
    // Disasters
    kw("rms titanic", 1912),
    kw("sinking of the titanic", 1912),
    kw("タイタニック号", 1912),
    kw("san francisco earthquake", 1906),
    kw("サンフランシスコ地震", 1906),
    kw("great kanto earthquake", 1923),
    kw("関東大震災", 1923),
    kw("chernobyl", 1986),
    kw("チェルノブイリ", 1986),
    // Revolutions, empires, dynasties
    kw("napoleon bonaparte", 1805),
    kw("emperor napoleon", 1805),
    kw("ナポレオン・ボナパルト", 1805),
    kw("ナポレオン戦争", 1805),
    kw("battle of waterloo", 1815),
    kw("ワーテルローの戦い", 1815),
    kw("french revolution", 1789),
    kw("フランス革命", 1789),
    kw("marie antoinette", 1789),
    kw("マリー・アントワネット", 1789),
    kw("storming of the bastille", 1789),
    kw("バスティーユ襲撃", 1789),
    kw("reign of terror", 1793),
    kw("恐怖政治", 1793),
    kw("spanish inquisition", 1480),
    kw("スペイン異端審問", 1480),
    kw("ottoman empire", 1600),
    kw("オスマン帝国", 1600),
    kw("qing dynasty", 1750),
    kw("清朝", 1750),
    kw("ming dynasty", 1500),
    kw("明朝", 1500),
    kw("shogunate", 1700),
    kw("tokugawa shogunate", 1700),
    kw("徳川", 1700),
    kw("mayan civilization", 1500),
    kw("マヤ文明", 1500),
    kw("aztec empire", 1500),
    kw("アステカ帝国", 1500),
    kw("george vi", 1936),
    kw("ジョージ6世", 1936),
    kw("edward viii", 1936),
    kw("エドワード8世", 1936),
    // Industrialization and the frontier
    kw("industrial revolution", 1820),
    kw("産業革命", 1820),
    kw("oregon trail", 1850),
    kw("オレゴン街道", 1850),
    kw("california gold rush", 1849),
    kw("ゴールドラッシュ", 1849),
    kw("great train robbery", 1855),
    // Abolition
    kw("underground railroad", 1850),
    kw("地下鉄道", 1850),
    kw("harriet tubman", 1850),
    kw("ハリエット・タブマン", 1850),
    kw("frederick douglass", 1850),
    kw("フレデリック・ダグラス", 1850),
    kw("emancipation proclamation", 1863),
    kw("奴隷解放宣言", 1863),
];

/// Smaller table used against reference-article prose (first match wins)
pub const REFERENCE_KEYWORDS: &[(&str, i32)] = &[
    ("roman empire", 100),
    ("julius caesar", -44),
    ("cleopatra", -30),
    ("spartacus", -71),
    ("pompeii", 79),
    ("king arthur", 500),
    ("joan of arc", 1429),
    ("genghis khan", 1220),
    ("marco polo", 1275),
    ("black death", 1348),
    ("henry viii", 1535),
    ("elizabeth i", 1580),
    ("thirty years war", 1635),
    ("louis xiv", 1680),
    ("peter the great", 1700),
    ("seven years war", 1757),
    ("french revolution", 1789),
    ("napoleonic", 1805),
    ("napoleon bonaparte", 1805),
    ("war of 1812", 1812),
    ("queen victoria", 1850),
    ("crimean war", 1854),
    ("american civil war", 1863),
    ("wild west", 1875),
    ("old west", 1875),
    ("american revolution", 1776),
    ("gold rush", 1849),
    ("great depression", 1933),
    ("holocaust", 1942),
    ("battle of britain", 1940),
    ("stalingrad", 1942),
    ("normandy", 1944),
    ("iwo jima", 1945),
    ("pearl harbor", 1941),
    ("hiroshima", 1945),
    ("korean war", 1951),
    ("vietnam war", 1968),
    ("cuban missile crisis", 1962),
    ("apollo 11", 1969),
    ("watergate", 1974),
    ("gulf war", 1991),
    ("september 11", 2001),
    ("iraq war", 2005),
];

/// Known fantasy franchises
pub const FANTASY_FRANCHISES: &[&str] = &[
    "lord of the rings",
    "the hobbit",
    "ロード・オブ・ザ・リング",
    "ホビット",
];

/// Invented-world phrasing
pub const FANTASY_KEYWORDS: &[&str] = &[
    "middle-earth",
    "middle earth",
    "ミドルアース",
    "中つ国",
    "fictional",
    "fantasy world",
    "imaginary",
    "mythical",
    "架空",
    "ファンタジー世界",
];

/// Mythic, unanchored past
pub const LONG_AGO_PHRASES: &[&str] = &["a long time ago", "はるか昔", "遥か昔", "遠い昔"];

enum Matcher {
    WordBoundary(Regex),
    Substring,
}

impl Matcher {
    fn is_match(&self, key: &str, text: &str) -> bool {
        match self {
            Matcher::WordBoundary(regex) => regex.is_match(text),
            Matcher::Substring => text.contains(key),
        }
    }
}

/// Alphanumeric keys match on word boundaries, other scripts as substrings
fn is_alphanumeric_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ' || c == '-')
}

fn compile(key: &str) -> Option<Matcher> {
    if !is_alphanumeric_key(key) {
        return Some(Matcher::Substring);
    }
    match Regex::new(&format!(r"\b{}\b", regex::escape(key))) {
        Ok(regex) => Some(Matcher::WordBoundary(regex)),
        Err(e) => {
            error!(keyword = key, error = %e, "Failed to compile keyword");
            None
        }
    }
}

static COMPILED: Lazy<Vec<(KeywordEntry, Matcher)>> = Lazy::new(|| {
    PERIOD_KEYWORDS
        .iter()
        .filter_map(|entry| compile(entry.key).map(|matcher| (*entry, matcher)))
        .collect()
});

static COMPILED_REFERENCE: Lazy<Vec<(&'static str, i32, Matcher)>> = Lazy::new(|| {
    REFERENCE_KEYWORDS
        .iter()
        .filter_map(|&(key, year)| compile(key).map(|matcher| (key, year, matcher)))
        .collect()
});

/// All keywords present in `text`, respecting genre gates
pub fn match_keywords(text: &str, genres: &[Genre]) -> Vec<KeywordEntry> {
    COMPILED
        .iter()
        .filter(|(entry, _)| {
            entry
                .genre_gate
                .map(|gate| gate.iter().any(|g| genres.contains(g)))
                .unwrap_or(true)
        })
        .filter(|(entry, matcher)| matcher.is_match(entry.key, text))
        .map(|(entry, _)| *entry)
        .collect()
}

/// Matches of the best (lowest) priority group only
pub fn best_priority_matches(text: &str, genres: &[Genre]) -> Vec<KeywordEntry> {
    let matches = match_keywords(text, genres);
    let Some(best) = matches.iter().map(|m| m.priority).min() else {
        return Vec::new();
    };
    matches.into_iter().filter(|m| m.priority == best).collect()
}

/// First reference keyword present in `text`
pub fn match_reference_keyword(text: &str) -> Option<(&'static str, i32)> {
    COMPILED_REFERENCE
        .iter()
        .find(|(key, _, matcher)| matcher.is_match(key, text))
        .map(|(key, year, _)| (*key, *year))
}

pub fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyword_compiles() {
        assert_eq!(COMPILED.len(), PERIOD_KEYWORDS.len());
        assert_eq!(COMPILED_REFERENCE.len(), REFERENCE_KEYWORDS.len());
    }

    #[test]
    fn test_keys_are_lowercase() {
        for entry in PERIOD_KEYWORDS {
            assert_eq!(entry.key, entry.key.to_lowercase(), "{}", entry.key);
        }
    }

    #[test]
    fn test_civil_war_is_genre_gated() {
        let text = "the heroes split into factions in a civil war";
        assert!(match_keywords(text, &[Genre::Action]).is_empty());

        let matches = match_keywords(text, &[Genre::War]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].year, 1863);
    }

    #[test]
    fn test_word_boundaries_for_alphanumeric_keys() {
        // "gulf war" must not fire inside "gulf warfare"
        assert!(match_keywords("a study of gulf warfare doctrine", &[]).is_empty());
        assert_eq!(match_keywords("elvis presley arrives", &[])[0].year, 1956);
    }

    #[test]
    fn test_substring_for_other_scripts() {
        let matches = match_keywords("硫黄島からの手紙", &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].year, 1945);
    }

    #[test]
    fn test_battle_keywords_outrank_people() {
        let matches = best_priority_matches("winston churchill and the evacuation of dunkirk", &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].key, "dunkirk");
        assert_eq!(matches[0].year, 1940);
    }

    #[test]
    fn test_reference_keywords() {
        assert_eq!(
            match_reference_keyword("during the crimean war a nurse"),
            Some(("crimean war", 1854))
        );
        assert_eq!(match_reference_keyword("a quiet village"), None);
    }

    #[test]
    fn test_common_words_do_not_trigger_keywords() {
        for text in [
            "midway through their road trip, two old friends quarrel about money",
            "a victorian house in present-day ohio",
            "a student in columbus, ohio joins a band",
            "the kennedy family reunion goes wrong",
            "a cruise ship named titanic ii sets sail",
            "an elvis impersonator in las vegas",
            "napoleon dynamite lives in idaho",
            "a weekend in normandy with the in-laws",
            "a chef opens a restaurant in hiroshima",
            "平成生まれの若者たちの物語",
            "広島の高校生の青春",
        ] {
            let matches = match_keywords(text, &[Genre::Comedy, Genre::Drama]);
            assert!(matches.is_empty(), "{:?} matched {:?}", text, matches);
        }
    }

    #[test]
    fn test_specific_phrases_still_match() {
        assert_eq!(match_keywords("before the battle of midway", &[])[0].year, 1942);
        assert_eq!(match_keywords("the kennedy assassination", &[])[0].year, 1963);
        assert_eq!(match_keywords("victorian era london", &[])[0].year, 1860);
    }

    #[test]
    fn test_reference_keywords_respect_word_boundaries() {
        let text = "the queen is a drama about queen elizabeth ii following the death of diana.";
        assert_eq!(match_reference_keyword(text), None);
        assert_eq!(
            match_reference_keyword("the reign of elizabeth i of england"),
            Some(("elizabeth i", 1580))
        );
    }
}
